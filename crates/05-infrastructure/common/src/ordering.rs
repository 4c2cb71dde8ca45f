//! 排序约定
//!
//! 数值越小优先级越高, 相同顺序值保持注册顺序。

use std::sync::Arc;

/// 最高优先级
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 最低优先级
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 可排序对象
pub trait Ordered {
    /// 顺序值
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 按顺序值稳定排序
pub fn sort_by_order<T: Ordered + ?Sized>(items: &mut [Arc<T>]) {
    items.sort_by_key(|item| item.order());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, i32);

    impl Ordered for Named {
        fn order(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = vec![
            Arc::new(Named("c", LOWEST_PRECEDENCE)),
            Arc::new(Named("a", 0)),
            Arc::new(Named("b", 0)),
            Arc::new(Named("first", HIGHEST_PRECEDENCE)),
        ];
        sort_by_order(&mut items);
        let names: Vec<_> = items.iter().map(|item| item.0).collect();
        assert_eq!(names, vec!["first", "a", "b", "c"]);
    }
}

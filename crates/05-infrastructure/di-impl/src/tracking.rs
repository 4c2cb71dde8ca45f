//! 线程内的组件创建跟踪
//!
//! 每个容器以自己的 id 为键, 在线程局部存储中记录当前线程正在创建的原型组件
//! 和组件创建链。只有创建线程自己能观察和修改这些状态。

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use uuid::Uuid;

thread_local! {
    static PROTOTYPES_IN_CREATION: RefCell<HashMap<Uuid, Vec<String>>> = RefCell::new(HashMap::new());
    static CREATION_CHAIN: RefCell<HashMap<Uuid, Vec<String>>> = RefCell::new(HashMap::new());
}

#[derive(Clone, Copy)]
enum Slot {
    Prototype,
    Chain,
}

impl Slot {
    fn with<R>(self, f: impl FnOnce(&mut HashMap<Uuid, Vec<String>>) -> R) -> R {
        match self {
            Self::Prototype => PROTOTYPES_IN_CREATION.with(|cell| f(&mut cell.borrow_mut())),
            Self::Chain => CREATION_CHAIN.with(|cell| f(&mut cell.borrow_mut())),
        }
    }
}

/// 创建标记守卫, 离开作用域时移除标记
///
/// 守卫不能跨线程移动。
#[must_use]
pub(crate) struct CreationGuard {
    owner: Uuid,
    name: String,
    slot: Slot,
    _not_send: PhantomData<Rc<()>>,
}

impl CreationGuard {
    fn enter(owner: Uuid, name: &str, slot: Slot) -> Self {
        slot.with(|map| map.entry(owner).or_default().push(name.to_string()));
        Self {
            owner,
            name: name.to_string(),
            slot,
            _not_send: PhantomData,
        }
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        let (owner, name) = (self.owner, &self.name);
        self.slot.with(|map| {
            if let Some(names) = map.get_mut(&owner) {
                if let Some(position) = names.iter().rposition(|entry| entry == name) {
                    names.remove(position);
                }
                if names.is_empty() {
                    map.remove(&owner);
                }
            }
        });
    }
}

/// 标记原型组件开始创建
pub(crate) fn begin_prototype(owner: Uuid, name: &str) -> CreationGuard {
    CreationGuard::enter(owner, name, Slot::Prototype)
}

/// 当前线程是否正在创建该原型组件
pub(crate) fn is_prototype_in_creation(owner: Uuid, name: &str) -> bool {
    Slot::Prototype.with(|map| {
        map.get(&owner)
            .is_some_and(|names| names.iter().any(|entry| entry == name))
    })
}

/// 进入组件创建链
pub(crate) fn enter_creation(owner: Uuid, name: &str) -> CreationGuard {
    CreationGuard::enter(owner, name, Slot::Chain)
}

/// 当前线程的创建链中是否包含该组件
pub(crate) fn is_in_creation_chain(owner: Uuid, name: &str) -> bool {
    Slot::Chain.with(|map| {
        map.get(&owner)
            .is_some_and(|names| names.iter().any(|entry| entry == name))
    })
}

/// 当前线程的创建链
pub(crate) fn creation_chain(owner: Uuid) -> Vec<String> {
    Slot::Chain.with(|map| map.get(&owner).cloned().unwrap_or_default())
}

/// 描述以 `name` 结尾的循环, 例如 `a -> b -> a`
pub(crate) fn describe_cycle(owner: Uuid, name: &str) -> String {
    let chain = creation_chain(owner);
    let start = chain.iter().position(|entry| entry == name);
    let mut cycle: Vec<&str> = match start {
        Some(start) => chain[start..].iter().map(String::as_str).collect(),
        None => chain.iter().map(String::as_str).collect(),
    };
    cycle.push(name);
    cycle.join(" -> ")
}

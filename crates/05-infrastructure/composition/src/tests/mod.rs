//! 组合层测试

mod integration_tests;

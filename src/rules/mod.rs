//! Rule validator

pub mod validator;

pub use validator::{RuleResult, RuleValidator};

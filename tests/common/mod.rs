//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{new_mail, TestEnv};
//!
//! #[test]
//! fn test_show() {
//!     let env = TestEnv::new();
//!     let id = env.manager.show(new_mail(&env, "uid-1")).unwrap();
//!     assert_eq!(env.notifier.on_screen_ids(), vec![id]);
//! }
//! ```

mod constants;
mod fixtures;
mod notifier;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{failing_operation_trigger, mail_for, new_mail, new_mail_in, TestEnv};
#[allow(unused_imports)]
pub use notifier::RecordingNotifier;

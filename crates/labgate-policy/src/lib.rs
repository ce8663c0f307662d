//! Labgate Policy: who and what may skip lab checks
//!
//! # Example
//!
//! ```
//! use labgate_policy::{AdminList, SkipRules, PrNameTemplate};
//! use labgate_core::SkipPredicate;
//!
//! let admins = AdminList::parse("instructor\nassistant\n");
//! let rules = SkipRules::new(admins.clone());
//!
//! assert!(rules.is_skipped(Some("Lab 5 [skip-lab]"), "student", None).unwrap());
//! assert!(rules.is_skipped(None, "assistant", None).unwrap());
//!
//! let check = PrNameTemplate::default().check("Laboratory work #5, Ivanov Ivan - 22FPL1", "student", &admins);
//! assert_eq!(check.exit_code(), 0);
//! ```

pub mod admins;
pub mod pr_name;
pub mod skip;

pub use admins::AdminList;
pub use pr_name::{PrNameCheck, PrNameTemplate, SKIP_NAME_DIRECTIVE};
pub use skip::{SkipCause, SkipRules, SKIP_LAB_DIRECTIVE};

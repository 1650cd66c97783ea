//! Growing the Windows Recovery Environment partition
//!
//! Reads the disk layout, decides how to make room next to the OS partition,
//! and drives reagentc plus the storage cmdlets (or diskpart on MBR disks) to
//! rebuild the recovery partition one increment larger.

pub mod agent;
pub mod backup;
pub mod error;
pub mod events;
pub mod inspect;
pub mod layout;
pub mod mutate;
pub mod parsing;
pub mod plan;
pub mod privileges;
pub mod run;
pub mod tool;
pub mod types;
pub mod verification;

pub use error::ResizeError;
pub use events::RunResult;
pub use mutate::SettlePolicy;
pub use privileges::check_privilege_requirements;
pub use run::{RunOptions, RunOutcome, run};
pub use tool::SystemRunner;

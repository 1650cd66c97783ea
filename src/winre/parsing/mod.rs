//! Parsing utilities for reagentc, ReAgent.xml, storage cmdlet and diskpart output

pub mod cmdlet;
pub mod diskpart;
pub mod reagent_xml;
pub mod reagentc;

pub use cmdlet::{CmdletDisk, CmdletPartition, CmdletSupportedSize, CmdletVolume};
pub use diskpart::{build_recovery_script, diskpart_succeeded};
pub use reagent_xml::{WinreLocationRecord, parse_winre_location, replace_winre_location};
pub use reagentc::parse_reagentc_info;

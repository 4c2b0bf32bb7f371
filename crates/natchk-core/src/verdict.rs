use std::fmt;

/// The terminal classification emitted by a classification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Public,
    FullCone,
    RestrictedCone,
    PortRestrictedCone,
    Symmetric,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Public => "PUBLIC",
            Verdict::FullCone => "FULL_CONE",
            Verdict::RestrictedCone => "RESTRICTED_CONE",
            Verdict::PortRestrictedCone => "PORT_RESTRICTED_CONE",
            Verdict::Symmetric => "SYMMETRIC",
            Verdict::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

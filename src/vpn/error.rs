//! Setup error kinds

use crate::platform::PlatformError;
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Failed to resolve {addr}: {reason}")]
    Resolution { addr: String, reason: String },
    #[error("No route to host {0}")]
    NoRoute(Ipv4Addr),
    #[error("Route to {0} has no gateway")]
    NoGateway(Ipv4Addr),
    #[error("Link not found: {0}")]
    LinkNotFound(String),
    #[error(
        "probably {name} command is missing from your system or not found in $PATH, make sure it is available"
    )]
    ExecutableNotFound { name: String },
    #[error("error while running {tool}: {source}")]
    ExternalCommand {
        tool: String,
        source: PlatformError,
    },
    #[error("Platform error: {0}")]
    Platform(PlatformError),
}

impl From<PlatformError> for SetupError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::LinkNotFound(name) => SetupError::LinkNotFound(name),
            other => SetupError::Platform(other),
        }
    }
}

/// Treat "already exists" as success; the entity is what we wanted anyway.
pub(crate) fn tolerate_existing(
    result: Result<(), PlatformError>,
    what: &str,
) -> Result<(), SetupError> {
    match result {
        Err(PlatformError::AlreadyExists(detail)) => {
            debug!(what, %detail, "already present, skipping");
            Ok(())
        }
        other => Ok(other?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::NoRoute(Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(err.to_string(), "No route to host 203.0.113.5");

        let err = SetupError::Resolution {
            addr: "nope".to_string(),
            reason: "invalid socket address".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to resolve nope: invalid socket address");

        let err = SetupError::ExecutableNotFound {
            name: "iptables".to_string(),
        };
        assert!(err.to_string().contains("iptables command is missing"));
        assert!(err.to_string().contains("$PATH"));

        let err = SetupError::ExternalCommand {
            tool: "iptables".to_string(),
            source: PlatformError::CommandFailed {
                command: "iptables -F".to_string(),
                stderr: "Permission denied".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "error while running iptables: Command `iptables -F` failed: Permission denied"
        );
    }

    #[test]
    fn test_link_not_found_maps_to_own_kind() {
        let err: SetupError = PlatformError::LinkNotFound("tun0".to_string()).into();
        assert!(matches!(err, SetupError::LinkNotFound(name) if name == "tun0"));

        let err: SetupError = PlatformError::UnsupportedPlatform.into();
        assert!(matches!(err, SetupError::Platform(_)));
    }

    #[test]
    fn test_tolerate_existing() {
        let result = tolerate_existing(
            Err(PlatformError::AlreadyExists("10.8.0.2/24".to_string())),
            "address",
        );
        assert!(result.is_ok());

        assert!(tolerate_existing(Ok(()), "route").is_ok());

        let result = tolerate_existing(
            Err(PlatformError::CommandFailed {
                command: "ip route add".to_string(),
                stderr: "Network is unreachable".to_string(),
            }),
            "route",
        );
        assert!(matches!(result, Err(SetupError::Platform(_))));
    }
}

//! Container options.
//!
//! Options are plain data with builder-style setters. With the `config`
//! feature they can also be read from JSON.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// What `build()` does when one [`LifetimePolicy`](crate::LifetimePolicy)
/// handle backs several registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum PolicySharing {
    /// Registrations sharing a policy share one cached instance.
    #[default]
    Collapse,
    /// Sharing a policy is a registration error.
    Forbid,
}

/// Behavioral switches for a container.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{ContainerOptions, PolicySharing, ServiceCollection};
///
/// let options = ContainerOptions::default()
///     .implicit_registration(false)
///     .policy_sharing(PolicySharing::Forbid);
///
/// let services = ServiceCollection::with_options(options.clone());
/// assert_eq!(services.options(), &options);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Build unregistered `Injectable` types as implicit transients.
    pub implicit_registration: bool,
    /// Treatment of policy handles shared between registrations.
    pub policy_sharing: PolicySharing,
    /// Run teardown when the last provider handle or a scope is dropped.
    pub dispose_on_drop: bool,
    /// Maximum nesting of resolutions on one thread.
    pub max_depth: usize,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            implicit_registration: true,
            policy_sharing: PolicySharing::Collapse,
            dispose_on_drop: true,
            max_depth: 1024,
        }
    }
}

impl ContainerOptions {
    pub fn implicit_registration(mut self, enabled: bool) -> Self {
        self.implicit_registration = enabled;
        self
    }

    pub fn policy_sharing(mut self, sharing: PolicySharing) -> Self {
        self.policy_sharing = sharing;
        self
    }

    pub fn dispose_on_drop(mut self, enabled: bool) -> Self {
        self.dispose_on_drop = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Parses options from JSON; missing fields keep their defaults.
    ///
    /// ```
    /// use ferrous_lifetimes::{ContainerOptions, PolicySharing};
    ///
    /// let options = ContainerOptions::from_json_str(r#"{ "policy_sharing": "forbid" }"#).unwrap();
    /// assert_eq!(options.policy_sharing, PolicySharing::Forbid);
    /// assert!(options.implicit_registration);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> crate::DiResult<Self> {
        serde_json::from_str(json).map_err(|e| crate::DiError::Config(e.to_string()))
    }
}

//! Version resolution: the single authority for "which version is current"
//!
//! Every read path goes through [`resolve_current`], so fallback and repair
//! behavior is identical at every call site.

use crate::entities::{Template, Version};
use crate::error::{RegistryError, Result};
use tracing::warn;

/// Outcome of resolving a template's authoritative version.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub version: Version,

    /// True when the current pointer was null or dangling and the highest
    /// sequence number was used instead. Callers should persist the repair.
    pub fallback_used: bool,
}

/// Determine the single version to render.
///
/// A valid current pointer wins. A null, dangling or foreign pointer is a
/// consistency anomaly, never a crash: the version with the greatest
/// sequence number is returned instead, and the anomaly is reported. Only a
/// template with zero versions fails, with `NoVersionsAvailable`.
pub fn resolve_current(template: &Template, versions: &[Version]) -> Result<Resolved> {
    if let Some(current_id) = template.current_version {
        if let Some(version) = versions
            .iter()
            .find(|v| v.id == current_id && v.template_key == template.key)
        {
            return Ok(Resolved {
                version: version.clone(),
                fallback_used: false,
            });
        }
        warn!(
            template_key = %template.key,
            version_id = %current_id,
            "current pointer is dangling, falling back to highest sequence"
        );
    } else {
        warn!(
            template_key = %template.key,
            "current pointer is unset, falling back to highest sequence"
        );
    }

    let fallback = versions
        .iter()
        .filter(|v| v.template_key == template.key)
        .max_by_key(|v| v.sequence_number)
        .cloned()
        .ok_or_else(|| RegistryError::NoVersionsAvailable(template.key.to_string()))?;

    Ok(Resolved {
        version: fallback,
        fallback_used: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{TenantScope, VersionId};

    fn template_with(current: Option<VersionId>) -> Template {
        let mut t = Template::new(TenantScope::Global, "greeting", "Greeting");
        t.current_version = current;
        t
    }

    #[test]
    fn valid_pointer_wins_over_newer_versions() {
        let v1 = Version::new("greeting".into(), 1, "one");
        let v2 = Version::new("greeting".into(), 2, "two");
        let template = template_with(Some(v1.id));

        let resolved = resolve_current(&template, &[v2, v1.clone()]).unwrap();
        assert_eq!(resolved.version.id, v1.id);
        assert!(!resolved.fallback_used);
    }

    #[test]
    fn null_pointer_falls_back_to_highest_sequence() {
        let v1 = Version::new("greeting".into(), 1, "one");
        let v2 = Version::new("greeting".into(), 2, "two");
        let template = template_with(None);

        let resolved = resolve_current(&template, &[v1, v2.clone()]).unwrap();
        assert_eq!(resolved.version.id, v2.id);
        assert!(resolved.fallback_used);
    }

    #[test]
    fn dangling_pointer_falls_back() {
        let v1 = Version::new("greeting".into(), 1, "one");
        let template = template_with(Some(VersionId::generate()));

        let resolved = resolve_current(&template, &[v1.clone()]).unwrap();
        assert_eq!(resolved.version.id, v1.id);
        assert!(resolved.fallback_used);
    }

    #[test]
    fn foreign_version_is_treated_as_dangling() {
        let foreign = Version::new("other".into(), 5, "other");
        let own = Version::new("greeting".into(), 1, "own");
        let template = template_with(Some(foreign.id));

        let resolved = resolve_current(&template, &[foreign, own.clone()]).unwrap();
        assert_eq!(resolved.version.id, own.id);
        assert!(resolved.fallback_used);
    }

    #[test]
    fn zero_versions_is_no_versions_available() {
        let template = template_with(None);
        let err = resolve_current(&template, &[]).unwrap_err();
        assert!(matches!(err, RegistryError::NoVersionsAvailable(_)));
    }
}

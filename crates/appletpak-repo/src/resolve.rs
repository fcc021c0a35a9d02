//! Version resolution shared by the repository backends

use appletpak_core::{AppletInfo, AppletVersion};

/// Pick the entry satisfying a request for `id` at `version`
///
/// An exact textual version match always wins. Without one, and unless
/// `exact` is set, the highest version at or above the requested one within
/// the same major version is chosen. Without a requested version, the
/// highest available version of `id` is chosen.
pub fn resolve_version<'a, I>(
    candidates: I,
    id: &str,
    version: Option<&str>,
    exact: bool,
) -> Option<&'a AppletInfo>
where
    I: IntoIterator<Item = &'a AppletInfo>,
{
    let candidates = candidates.into_iter().filter(|c| c.id == id);

    let Some(version) = version else {
        return candidates.max_by_key(|c| AppletVersion::parse(&c.version));
    };

    let requested = AppletVersion::parse(version);
    let mut best: Option<(&AppletInfo, AppletVersion)> = None;

    for candidate in candidates {
        if candidate.version == version {
            return Some(candidate);
        }
        if exact {
            continue;
        }
        let (Some(requested), Some(available)) = (requested, AppletVersion::parse(&candidate.version))
        else {
            continue;
        };
        if available.major != requested.major || available < requested {
            continue;
        }
        if best.is_none_or(|(_, current)| available > current) {
            best = Some((candidate, available));
        }
    }

    if exact { None } else { best.map(|(info, _)| info) }
}

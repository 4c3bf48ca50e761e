/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Compare version strings reported by dpkg, Flatpak, and
    release feeds without shelling out to a comparator.

  Security / Safety Notes:
    Pure string handling; no I/O.

  Dependencies:
    None beyond std.

  Operational Scope:
    Used by the reconciliation step to decide upgrade vs skip.

  Revision History:
    2026-10-17 COD  Replaced external vercmp with in-process
                    dotted-numeric comparison.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic, total over numeric inputs
    - Unknown shapes compare only for equality
============================================================*/

use std::cmp::Ordering;

/// Compare two version strings.
///
/// Versions are split into `[epoch:]upstream[-revision]`. Each part is
/// compared as dot-separated integers, with missing trailing components
/// counting as zero. When a part contains a non-numeric component the
/// comparison degrades to raw equality: equal strings are `Equal`, anything
/// else is `None` (incomparable).
pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    let left = left.trim();
    let right = right.trim();
    if left == right {
        return Some(Ordering::Equal);
    }

    let a = split_version(left);
    let b = split_version(right);

    let ordering = compare_dotted(a.epoch.unwrap_or("0"), b.epoch.unwrap_or("0"))?;
    if ordering != Ordering::Equal {
        return Some(ordering);
    }
    let ordering = compare_dotted(a.upstream, b.upstream)?;
    if ordering != Ordering::Equal {
        return Some(ordering);
    }
    compare_dotted(a.revision.unwrap_or("0"), b.revision.unwrap_or("0"))
}

struct VersionParts<'a> {
    epoch: Option<&'a str>,
    upstream: &'a str,
    revision: Option<&'a str>,
}

fn split_version(raw: &str) -> VersionParts<'_> {
    let (epoch, rest) = match raw.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => {
            (Some(epoch), rest)
        }
        _ => (None, raw),
    };
    let (upstream, revision) = match rest.rsplit_once('-') {
        Some((upstream, revision)) if !upstream.is_empty() => (upstream, Some(revision)),
        _ => (rest, None),
    };
    VersionParts {
        epoch,
        upstream,
        revision,
    }
}

fn compare_dotted(left: &str, right: &str) -> Option<Ordering> {
    match (parse_dotted(left), parse_dotted(right)) {
        (Some(a), Some(b)) => {
            let len = a.len().max(b.len());
            for idx in 0..len {
                let x = a.get(idx).copied().unwrap_or(0);
                let y = b.get(idx).copied().unwrap_or(0);
                match x.cmp(&y) {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(Ordering::Equal)
        }
        _ if left == right => Some(Ordering::Equal),
        _ => None,
    }
}

fn parse_dotted(raw: &str) -> Option<Vec<u64>> {
    if raw.is_empty() {
        return None;
    }
    raw.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

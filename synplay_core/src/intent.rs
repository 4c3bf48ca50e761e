/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::intent
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Turn command-line selections, `--intent` overrides, and
    interactive answers into the ordered request list consumed
    by the run loop.

  Security / Safety Notes:
    Prompts read from the controlling terminal only.

  Dependencies:
    dialoguer for yes/no prompts.

  Operational Scope:
    Runs once, before any probing.

  Revision History:
    2026-10-17 COD  Authored selection and prompt flow.
============================================================*/

use std::collections::HashMap;

use dialoguer::Confirm;

use crate::component::{self, Component, ALL_PLATFORMS, CATALOG};
use crate::error::{Result, SynplayError};
use crate::reconcile::UserIntent;
use crate::runner::Request;
use crate::system::{GpuVendor, SystemInfo};

/// Source of yes/no answers for components without an explicit intent.
pub trait Prompter {
    fn confirm(&mut self, component: &Component) -> Result<bool>;
}

/// Terminal prompter.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, component: &Component) -> Result<bool> {
        Confirm::new()
            .with_prompt(format!(
                "Install or upgrade {} ({})?",
                component.name, component.category
            ))
            .default(true)
            .interact()
            .map_err(|err| {
                SynplayError::Config(format!(
                    "Cannot prompt ({err}); pass --yes or --intent ID=ACTION"
                ))
            })
    }
}

/// What the operator put on the command line.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub components: Vec<String>,
    pub all_platforms: bool,
    pub intents: Vec<String>,
    pub assume_yes: bool,
}

/// Split an `ID=ACTION` override.
pub fn parse_intent_flag(raw: &str) -> Result<(String, UserIntent)> {
    let Some((id, action)) = raw.split_once('=') else {
        return Err(SynplayError::Config(format!(
            "Malformed --intent `{raw}` (expected ID=install|upgrade|skip)"
        )));
    };
    let id = id.trim();
    if id.is_empty() {
        return Err(SynplayError::Config(format!(
            "Malformed --intent `{raw}`: empty component id"
        )));
    }
    Ok((id.to_string(), action.parse()?))
}

/// Build the ordered request list.
///
/// Explicit `--intent` values win, then `--yes` (force-install), then the
/// prompter. With nothing selected the host-appropriate catalog is offered
/// one component at a time.
pub fn build_requests<P: Prompter>(
    selection: &Selection,
    host: &SystemInfo,
    prompter: &mut P,
) -> Result<Vec<Request>> {
    let mut overrides: HashMap<String, UserIntent> = HashMap::new();
    let mut ids = selection.components.clone();
    if selection.all_platforms {
        ids.extend(ALL_PLATFORMS.iter().map(|id| id.to_string()));
    }
    for raw in &selection.intents {
        let (id, intent) = parse_intent_flag(raw)?;
        ids.push(id.clone());
        overrides.insert(id, intent);
    }

    let components = if ids.is_empty() {
        if selection.assume_yes {
            return Err(SynplayError::Config(
                "--yes needs components (use --component, --all-platforms, or --intent)".into(),
            ));
        }
        offered_catalog(host)
    } else {
        component::resolve(&ids)?
    };

    let mut requests = Vec::with_capacity(components.len());
    for component in components {
        let intent = match overrides.get(component.id) {
            Some(intent) => *intent,
            None if selection.assume_yes => UserIntent::ForceInstall,
            None => {
                if prompter.confirm(component)? {
                    UserIntent::AllowUpgrade
                } else {
                    UserIntent::SkipEntirely
                }
            }
        };
        requests.push(Request { component, intent });
    }
    Ok(requests)
}

/// Catalog entries worth offering on this host; the driver entries only
/// appear for matching hardware.
fn offered_catalog(host: &SystemInfo) -> Vec<&'static Component> {
    CATALOG
        .iter()
        .filter(|component| match component.id {
            "nvidia" => host.gpu == GpuVendor::Nvidia,
            "mesa" => matches!(host.gpu, GpuVendor::Amd | GpuVendor::Intel),
            "intel-va" => host.gpu == GpuVendor::Intel,
            "vm-tools" => component::guest_packages(host).is_some(),
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers from a fixed script and remembers who was asked.
    struct Scripted {
        answers: Vec<bool>,
        asked: Vec<&'static str>,
    }

    impl Scripted {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: answers.to_vec(),
                asked: Vec::new(),
            }
        }
    }

    impl Prompter for Scripted {
        fn confirm(&mut self, component: &Component) -> Result<bool> {
            self.asked.push(component.id);
            if self.answers.is_empty() {
                Ok(false)
            } else {
                Ok(self.answers.remove(0))
            }
        }
    }

    struct Unavailable;

    impl Prompter for Unavailable {
        fn confirm(&mut self, _component: &Component) -> Result<bool> {
            Err(SynplayError::Config("no terminal".into()))
        }
    }

    fn selection(components: &[&str], intents: &[&str], assume_yes: bool) -> Selection {
        Selection {
            components: components.iter().map(|s| s.to_string()).collect(),
            all_platforms: false,
            intents: intents.iter().map(|s| s.to_string()).collect(),
            assume_yes,
        }
    }

    #[test]
    fn intent_flag_parses() {
        let (id, intent) = parse_intent_flag("steam=upgrade").unwrap();
        assert_eq!(id, "steam");
        assert_eq!(intent, UserIntent::AllowUpgrade);
        assert!(parse_intent_flag("steam").is_err());
        assert!(parse_intent_flag("=install").is_err());
        assert!(parse_intent_flag("steam=later").is_err());
    }

    #[test]
    fn yes_forces_every_selected_component() {
        let requests = build_requests(
            &selection(&["steam", "wine"], &[], true),
            &SystemInfo::unknown(),
            &mut Unavailable,
        )
        .unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.intent == UserIntent::ForceInstall));
    }

    #[test]
    fn explicit_intent_beats_yes_and_keeps_order() {
        let requests = build_requests(
            &selection(&["steam"], &["mangohud=skip"], true),
            &SystemInfo::unknown(),
            &mut Unavailable,
        )
        .unwrap();
        let got: Vec<(&str, UserIntent)> = requests
            .iter()
            .map(|r| (r.component.id, r.intent))
            .collect();
        assert_eq!(
            got,
            vec![
                ("steam", UserIntent::ForceInstall),
                ("mangohud", UserIntent::SkipEntirely)
            ]
        );
    }

    #[test]
    fn prompt_answers_map_to_upgrade_or_skip() {
        let mut prompter = Scripted::new(&[true, false]);
        let requests = build_requests(
            &selection(&["lutris", "heroic"], &[], false),
            &SystemInfo::unknown(),
            &mut prompter,
        )
        .unwrap();
        assert_eq!(prompter.asked, vec!["lutris", "heroic"]);
        assert_eq!(requests[0].intent, UserIntent::AllowUpgrade);
        assert_eq!(requests[1].intent, UserIntent::SkipEntirely);
    }

    #[test]
    fn all_platforms_expands_and_dedupes() {
        let mut sel = selection(&["steam"], &[], true);
        sel.all_platforms = true;
        let requests = build_requests(&sel, &SystemInfo::unknown(), &mut Unavailable).unwrap();
        let ids: Vec<&str> = requests.iter().map(|r| r.component.id).collect();
        assert_eq!(ids, vec!["steam", "lutris", "heroic", "protonup"]);
    }

    #[test]
    fn empty_selection_offers_hardware_matched_catalog() {
        let host = SystemInfo {
            gpu: GpuVendor::Amd,
            ..SystemInfo::unknown()
        };
        let mut prompter = Scripted::new(&[]);
        let requests = build_requests(&Selection::default(), &host, &mut prompter).unwrap();
        assert!(prompter.asked.contains(&"mesa"));
        assert!(!prompter.asked.contains(&"nvidia"));
        assert!(!prompter.asked.contains(&"intel-va"));
        assert!(!prompter.asked.contains(&"vm-tools"));
        assert_eq!(requests.len(), CATALOG.len() - 3);
    }

    #[test]
    fn guest_tools_are_offered_inside_a_vm() {
        let host = SystemInfo {
            gpu: GpuVendor::Intel,
            virtualization: Some("VirtualBox".into()),
            ..SystemInfo::unknown()
        };
        let mut prompter = Scripted::new(&[]);
        build_requests(&Selection::default(), &host, &mut prompter).unwrap();
        assert!(prompter.asked.contains(&"vm-tools"));
        assert!(prompter.asked.contains(&"intel-va"));
    }

    #[test]
    fn yes_without_selection_is_rejected() {
        let err = build_requests(
            &selection(&[], &[], true),
            &SystemInfo::unknown(),
            &mut Unavailable,
        )
        .unwrap_err();
        assert!(matches!(err, SynplayError::Config(_)));
    }

    #[test]
    fn prompt_failure_surfaces() {
        assert!(build_requests(
            &selection(&["steam"], &[], false),
            &SystemInfo::unknown(),
            &mut Unavailable
        )
        .is_err());
    }
}

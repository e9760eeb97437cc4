//! Benchmark runner.
//!
//! For each group with at least one focused item:
//!
//! 1. Locate the group's process (absence goes through the
//!    [`MissingProcessPolicy`], lookup errors make every item an error)
//! 2. Resolve the subject: flag-derived path, fixed path, or tree root
//! 3. Evaluate each focused item against it
//!
//! Unmet prerequisites become Skip outcomes naming the prerequisite. Items
//! never stop each other: an error on one is recorded and the run moves on.

use super::focus::Focus;
use super::item::{Check, CheckGroup, CheckItem, ProcessNames, Subject};
use super::outcome::{CheckOutcome, MissingProcessPolicy, SkipReason, Status};
use super::registry::Registry;
use super::report::{ItemReport, RunReport, Summary};
use crate::bounded::IoBounds;
use crate::flags::{resolve_flag, PathPresence};
use crate::logging::{event_names, generate_run_id, get_host_id, LogContext, Stage};
use crate::predicate::{check_tree, PredicateError, Principals, TreeScope, Verdict};
use crate::process::{ProcessHandle, ProcessLocator};
use crate::log_event;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What a group's items are evaluated against, once prerequisites are met.
enum Target<'a> {
    File(PathBuf),
    Tree { root: PathBuf, scope: TreeScope },
    Flags(&'a ProcessHandle),
}

/// Evaluates registries against the host.
pub struct Runner {
    locator: Box<dyn ProcessLocator>,
    principals: Principals,
    bounds: IoBounds,
    policy: MissingProcessPolicy,
    names: ProcessNames,
    log: LogContext,
}

impl Runner {
    pub fn new(locator: Box<dyn ProcessLocator>, principals: Principals, bounds: IoBounds) -> Self {
        Self {
            locator,
            principals,
            bounds,
            policy: MissingProcessPolicy::default(),
            names: ProcessNames::default(),
            log: LogContext::new(generate_run_id(), get_host_id()),
        }
    }

    pub fn with_policy(mut self, policy: MissingProcessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_process_names(mut self, names: ProcessNames) -> Self {
        self.names = names;
        self
    }

    /// Use existing correlation ids instead of fresh ones.
    pub fn with_log_context(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn policy(&self) -> MissingProcessPolicy {
        self.policy
    }

    /// Run every focused item of `registry`.
    pub fn run(&self, registry: &Registry, focus: &Focus) -> RunReport {
        let started = Instant::now();
        let generated_at = Utc::now();
        log_event!(
            self.log,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            "benchmark run started",
            policy = display(self.policy),
            items = registry.focused(focus).count() as u64
        );

        let items: Vec<ItemReport> = registry
            .groups()
            .iter()
            .flat_map(|group| self.run_group(group, focus))
            .collect();
        let summary = Summary::tally(&items);
        let duration_ms = started.elapsed().as_millis() as u64;

        log_event!(
            self.log,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Evaluate,
            "benchmark run finished",
            passed = summary.passed as u64,
            failed = summary.failed as u64,
            skipped = summary.skipped as u64,
            errored = summary.errored as u64,
            duration_ms = duration_ms
        );

        RunReport {
            schema_version: nb_common::SCHEMA_VERSION.to_string(),
            run_id: self.log.run_id.clone(),
            host_id: self.log.host_id.clone(),
            generated_at,
            duration_ms,
            missing_process: self.policy,
            items,
            summary,
        }
    }

    /// Run the focused items of one group, in declaration order.
    pub fn run_group(&self, group: &CheckGroup, focus: &Focus) -> Vec<ItemReport> {
        let items: Vec<&CheckItem> = group.items.iter().filter(|i| focus.matches(i)).collect();
        if items.is_empty() {
            return Vec::new();
        }
        log_event!(
            self.log,
            DEBUG,
            event_names::GROUP_STARTED,
            Stage::Evaluate,
            "group started",
            items = items.len() as u64,
            subject = debug(&group.subject)
        );

        let handle = match self.locate(group) {
            Ok(handle) => handle,
            Err(unmet) => return self.record_all(&items, unmet),
        };

        let target = match self.resolve_subject(&group.subject, handle.as_ref()) {
            Ok(target) => target,
            Err(unmet) => {
                let reason = unmet.message();
                if unmet.status() == Status::Error {
                    log_event!(
                        self.log,
                        WARN,
                        event_names::RESOLVE_FAILED,
                        Stage::Resolve,
                        "subject could not be resolved",
                        reason = reason.as_str()
                    );
                } else {
                    log_event!(
                        self.log,
                        INFO,
                        event_names::RESOLVE_SKIPPED,
                        Stage::Resolve,
                        "subject unavailable",
                        reason = reason.as_str()
                    );
                }
                return self.record_all(&items, unmet);
            }
        };

        items
            .into_iter()
            .map(|item| {
                let outcome = self.evaluate(item, &target);
                self.record(item, outcome)
            })
            .collect()
    }

    fn locate(&self, group: &CheckGroup) -> Result<Option<ProcessHandle>, CheckOutcome> {
        let Some(process) = group.process else {
            return Ok(None);
        };
        let name = self.names.name(process);

        match self.locator.locate(name) {
            Ok(Some(handle)) => {
                log_event!(
                    self.log,
                    DEBUG,
                    event_names::LOCATE_FOUND,
                    Stage::Locate,
                    "process located",
                    process = name,
                    pid = handle.pid() as u64
                );
                Ok(Some(handle))
            }
            Ok(None) => {
                log_event!(
                    self.log,
                    INFO,
                    event_names::LOCATE_ABSENT,
                    Stage::Locate,
                    "process not running",
                    process = name,
                    policy = display(self.policy)
                );
                Err(self.policy.outcome(name))
            }
            Err(e) => {
                let err: nb_common::Error = e.into();
                log_event!(
                    self.log,
                    WARN,
                    event_names::LOCATE_FAILED,
                    Stage::Locate,
                    "process lookup failed",
                    process = name,
                    error = display(&err)
                );
                Err(CheckOutcome::error(&err))
            }
        }
    }

    fn resolve_subject<'a>(
        &self,
        subject: &Subject,
        handle: Option<&'a ProcessHandle>,
    ) -> Result<Target<'a>, CheckOutcome> {
        let target = match subject {
            Subject::FlagPath(query) => {
                let handle = require_handle(handle)?;
                let resolved = resolve_flag(handle, query, &self.bounds)
                    .map_err(|e| CheckOutcome::error(&e.into()))?;
                match (resolved.presence, resolved.path) {
                    (PathPresence::Present, Some(path)) => Target::File(path),
                    (PathPresence::Missing, Some(path)) => {
                        return Err(skip(SkipReason::FileNotFound { path }))
                    }
                    _ => {
                        return Err(skip(SkipReason::FlagNotSet {
                            flag: query.name().to_string(),
                        }))
                    }
                }
            }
            Subject::Path(path) => {
                self.require_exists(path)?;
                Target::File(path.clone())
            }
            Subject::Tree { root, scope } => {
                self.require_exists(root)?;
                Target::Tree {
                    root: root.clone(),
                    scope: *scope,
                }
            }
            Subject::Flags => Target::Flags(require_handle(handle)?),
        };
        Ok(target)
    }

    fn require_exists(&self, path: &Path) -> Result<(), CheckOutcome> {
        match self.bounds.metadata(path) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(skip(SkipReason::FileNotFound {
                path: path.to_path_buf(),
            })),
            Err(e) => Err(CheckOutcome::error(&e.into_error(path))),
        }
    }

    fn evaluate(&self, item: &CheckItem, target: &Target<'_>) -> CheckOutcome {
        let verdict: Result<Verdict, PredicateError> = match (&item.check, target) {
            (Check::Permissions(p), Target::File(path)) => p.evaluate(path, &self.bounds),
            (Check::Ownership(o), Target::File(path)) => {
                o.evaluate(path, &self.principals, &self.bounds)
            }
            (Check::Permissions(p), Target::Tree { root, scope }) => {
                check_tree(root, *scope, &self.bounds, |_, meta| p.evaluate_metadata(meta))
                    .map(|report| report.into_verdict())
            }
            (Check::Ownership(o), Target::Tree { root, scope }) => {
                o.resolve(&self.principals).and_then(|expected| {
                    check_tree(root, *scope, &self.bounds, |_, meta| {
                        expected.evaluate_metadata(meta, &self.principals)
                    })
                    .map(|report| report.into_verdict())
                })
            }
            (Check::Flag(c), Target::Flags(handle)) => Ok(c.evaluate(handle)),
            (check, _) => {
                return CheckOutcome::error(&nb_common::Error::InvalidConfig(format!(
                    "item {}: {} does not apply to its group's subject",
                    item.id, check
                )))
            }
        };

        match verdict {
            Ok(v) if v.passed => CheckOutcome::Pass { detail: v.detail },
            Ok(v) => CheckOutcome::Fail { detail: v.detail },
            Err(e) => CheckOutcome::error(&e.into()),
        }
    }

    fn record_all(&self, items: &[&CheckItem], outcome: CheckOutcome) -> Vec<ItemReport> {
        items
            .iter()
            .map(|item| self.record(item, outcome.clone()))
            .collect()
    }

    fn record(&self, item: &CheckItem, outcome: CheckOutcome) -> ItemReport {
        log_event!(
            self.log,
            DEBUG,
            event_names::ITEM_OUTCOME,
            Stage::Evaluate,
            "item evaluated",
            item_id = display(&item.id),
            status = display(outcome.status()),
            detail = outcome.message().as_str()
        );
        ItemReport {
            id: item.id.clone(),
            title: item.title.clone(),
            scored: item.scored,
            outcome,
        }
    }
}

fn skip(reason: SkipReason) -> CheckOutcome {
    CheckOutcome::Skip { reason }
}

fn require_handle(handle: Option<&ProcessHandle>) -> Result<&ProcessHandle, CheckOutcome> {
    handle.ok_or_else(|| {
        CheckOutcome::error(&nb_common::Error::InvalidConfig(
            "check group needs a target process but declares none".to_string(),
        ))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::bench::item::NodeProcess;
    use crate::flags::{BaseDir, FlagQuery};
    use crate::mock_process::{MockHandleBuilder, MockLocator};
    use crate::predicate::{FlagCheck, FlagPredicate, OwnershipPredicate, PermissionPredicate};
    use crate::test_utils::TestHost;
    use std::time::Duration;

    fn perms(id: [u32; 3]) -> CheckItem {
        CheckItem::scored(id, "perms", Check::Permissions(PermissionPredicate::at_most(0o644)))
    }

    fn owner(id: [u32; 3]) -> CheckItem {
        CheckItem::scored(id, "owner", Check::Ownership(OwnershipPredicate::root()))
    }

    fn kubeconfig_registry() -> Registry {
        Registry::new(vec![CheckGroup::new(
            Some(NodeProcess::Kubelet),
            Subject::FlagPath(FlagQuery::new("kubeconfig").base(BaseDir::Unset)),
        )
        .item(perms([2, 2, 1]))
        .item(owner([2, 2, 2]))])
        .unwrap()
    }

    fn runner(host: &TestHost, locator: MockLocator) -> Runner {
        Runner::new(Box::new(locator), host.principals(), IoBounds::default())
    }

    fn statuses(report: &RunReport) -> Vec<Status> {
        report.items.iter().map(|i| i.status()).collect()
    }

    #[test]
    fn test_flag_path_group_passes() {
        let host = TestHost::new();
        let conf = host.write_mode("etc/kubernetes/kubelet.conf", "apiVersion: v1\n", 0o600);
        let kubelet = MockHandleBuilder::new("kubelet")
            .flag("kubeconfig", &conf.to_string_lossy())
            .build();

        let report = runner(&host, MockLocator::new().with_process(kubelet))
            .run(&kubeconfig_registry(), &Focus::all());
        crate::test_log_report!(report);

        assert_eq!(statuses(&report), vec![Status::Pass, Status::Pass]);
        assert_eq!(report.items[0].outcome.message(), "0600 <= 0644");
        assert_eq!(report.summary.passed, 2);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_permissive_file_fails() {
        let host = TestHost::with_foreign_root();
        let conf = host.write_mode("kubelet.conf", "x", 0o666);
        let kubelet = MockHandleBuilder::new("kubelet")
            .flag("kubeconfig", &conf.to_string_lossy())
            .build();

        let report = runner(&host, MockLocator::new().with_process(kubelet))
            .run(&kubeconfig_registry(), &Focus::all());

        assert_eq!(statuses(&report), vec![Status::Fail, Status::Fail]);
        assert_eq!(report.items[0].outcome.message(), "0666 > 0644");
        assert!(report.items[1].outcome.message().starts_with("owner kube("));
    }

    #[test]
    fn test_missing_process_skips_by_default() {
        let host = TestHost::new();
        let report = runner(&host, MockLocator::new()).run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Skip, Status::Skip]);
        assert_eq!(report.items[1].outcome.message(), "process not found: kubelet");
    }

    #[test]
    fn test_missing_process_fail_policy() {
        let host = TestHost::new();
        let report = runner(&host, MockLocator::new())
            .with_policy(MissingProcessPolicy::Fail)
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Fail, Status::Fail]);
        assert_eq!(
            report.items[0].outcome,
            CheckOutcome::Fail {
                detail: "process not found: kubelet".into()
            }
        );
        assert_eq!(report.missing_process, MissingProcessPolicy::Fail);
    }

    #[test]
    fn test_unset_flag_skips() {
        let host = TestHost::new();
        let kubelet = MockHandleBuilder::new("kubelet").flag("v", "2").build();
        let report = runner(&host, MockLocator::new().with_process(kubelet))
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Skip, Status::Skip]);
        assert_eq!(report.items[0].outcome.message(), "flag not set: --kubeconfig");
    }

    #[test]
    fn test_missing_file_skips() {
        let host = TestHost::new();
        let missing = host.path("nope/kubelet.conf");
        let kubelet = MockHandleBuilder::new("kubelet")
            .flag("kubeconfig", &missing.to_string_lossy())
            .build();
        let report = runner(&host, MockLocator::new().with_process(kubelet))
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(
            report.items[0].outcome,
            CheckOutcome::Skip {
                reason: SkipReason::FileNotFound { path: missing }
            }
        );
    }

    #[test]
    fn test_unreadable_subject_is_error_not_skip() {
        let host = TestHost::new();
        let file = host.write_mode("kubelet.conf", "x", 0o644);
        let kubelet = MockHandleBuilder::new("kubelet")
            .flag("kubeconfig", &file.join("child").to_string_lossy())
            .build();

        let report = runner(&host, MockLocator::new().with_process(kubelet))
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Error, Status::Error]);

        let registry = Registry::new(vec![CheckGroup::new(
            None,
            Subject::Tree {
                root: file.join("child"),
                scope: TreeScope::FilesOnly,
            },
        )
        .item(perms([2, 2, 3]))])
        .unwrap();
        let report = runner(&host, MockLocator::new()).run(&registry, &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Error]);
    }

    #[test]
    fn test_locator_error_marks_items_errored() {
        let host = TestHost::new();
        let report = runner(&host, MockLocator::new().timing_out(Duration::from_millis(5)))
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Error, Status::Error]);
        assert!(report.has_errors());
        match &report.items[0].outcome {
            CheckOutcome::Error { error } => assert_eq!(error.code, 32),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_unfocused_group_is_not_located() {
        let host = TestHost::new();
        let locator = MockLocator::new();
        let registry = Registry::new(vec![
            CheckGroup::new(
                Some(NodeProcess::KubeProxy),
                Subject::FlagPath(FlagQuery::new("kubeconfig").base(BaseDir::CurrentDir)),
            )
            .item(perms([2, 2, 5])),
            CheckGroup::new(None, Subject::Path(host.write_mode("svc", "x", 0o644)))
                .item(perms([2, 2, 3])),
        ])
        .unwrap();

        let runner = runner(&host, locator);
        let focus = Focus::sections(vec![nb_common::ItemId::from([2, 2, 3])]);
        let report = runner.run(&registry, &focus);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].id.to_string(), "2.2.3");
        assert_eq!(report.items[0].status(), Status::Pass);
    }

    #[test]
    fn test_tree_group_reports_violations() {
        let host = TestHost::new();
        let dir = host.mkdir("kubelet.service.d");
        host.write_mode("kubelet.service.d/10-kubeadm.conf", "[Service]\n", 0o644);
        host.write_mode("kubelet.service.d/20-extra.conf", "[Service]\n", 0o664);

        let registry = Registry::new(vec![CheckGroup::new(
            None,
            Subject::Tree {
                root: dir.clone(),
                scope: TreeScope::FilesOnly,
            },
        )
        .item(perms([2, 2, 3]))
        .item(owner([2, 2, 4]))])
        .unwrap();

        let report = runner(&host, MockLocator::new()).run(&registry, &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Fail, Status::Pass]);
        let detail = report.items[0].outcome.message();
        assert!(detail.starts_with("1 of 2 entries"), "{}", detail);
        assert!(detail.contains("20-extra.conf: 0664 > 0644"), "{}", detail);
    }

    #[test]
    fn test_tree_group_waits_for_its_process() {
        let host = TestHost::new();
        let dir = host.mkdir("kubelet.service.d");
        host.write_mode("kubelet.service.d/10-kubeadm.conf", "[Service]\n", 0o644);
        let registry = Registry::new(vec![CheckGroup::new(
            Some(NodeProcess::Kubelet),
            Subject::Tree {
                root: dir,
                scope: TreeScope::FilesOnly,
            },
        )
        .item(perms([2, 2, 3]))
        .item(owner([2, 2, 4]))])
        .unwrap();

        let report = runner(&host, MockLocator::new())
            .with_policy(MissingProcessPolicy::Fail)
            .run(&registry, &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Fail, Status::Fail]);
        assert_eq!(report.items[0].outcome.message(), "process not found: kubelet");

        let kubelet = MockHandleBuilder::new("kubelet").build();
        let report = runner(&host, MockLocator::new().with_process(kubelet))
            .with_policy(MissingProcessPolicy::Fail)
            .run(&registry, &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Pass, Status::Pass]);
    }

    #[test]
    fn test_missing_tree_root_skips() {
        let host = TestHost::new();
        let registry = Registry::new(vec![CheckGroup::new(
            None,
            Subject::Tree {
                root: host.path("absent.d"),
                scope: TreeScope::FilesOnly,
            },
        )
        .item(perms([2, 2, 3]))])
        .unwrap();
        let report = runner(&host, MockLocator::new()).run(&registry, &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Skip]);
    }

    #[test]
    fn test_flags_group() {
        let host = TestHost::new();
        let kubelet = MockHandleBuilder::new("kubelet")
            .flag("anonymous-auth", "false")
            .flag("authorization-mode", "AlwaysAllow")
            .build();
        let registry = Registry::new(vec![CheckGroup::new(Some(NodeProcess::Kubelet), Subject::Flags)
            .item(CheckItem::scored(
                [2, 1, 1],
                "anon",
                Check::Flag(FlagCheck::new("anonymous-auth", FlagPredicate::Equals("false".into()))),
            ))
            .item(CheckItem::scored(
                [2, 1, 2],
                "authz",
                Check::Flag(FlagCheck::new(
                    "authorization-mode",
                    FlagPredicate::NotEquals("AlwaysAllow".into()),
                )),
            ))])
        .unwrap();

        let report = runner(&host, MockLocator::new().with_process(kubelet)).run(&registry, &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Pass, Status::Fail]);
        assert_eq!(report.items[0].outcome.message(), "--anonymous-auth=false");
    }

    #[test]
    fn test_renamed_process() {
        let host = TestHost::new();
        let conf = host.write_mode("kubelet.conf", "x", 0o644);
        let hyperkube = MockHandleBuilder::new("hyperkube")
            .flag("kubeconfig", &conf.to_string_lossy())
            .build();
        let report = runner(&host, MockLocator::new().with_process(hyperkube))
            .with_process_names(ProcessNames {
                kubelet: "hyperkube".into(),
                ..Default::default()
            })
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(statuses(&report), vec![Status::Pass, Status::Pass]);
    }

    #[test]
    fn test_report_carries_context() {
        let host = TestHost::new();
        let report = runner(&host, MockLocator::new())
            .with_log_context(LogContext::new("run-abc", "host-1"))
            .run(&kubeconfig_registry(), &Focus::all());
        assert_eq!(report.run_id, "run-abc");
        assert_eq!(report.host_id, "host-1");
        assert_eq!(report.schema_version, nb_common::SCHEMA_VERSION);
        assert_eq!(report.summary.total, 2);
    }
}

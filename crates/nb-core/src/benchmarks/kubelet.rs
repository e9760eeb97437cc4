//! Section 2.1: kubelet arguments.
//!
//! Defaults are the kubelet's own, so an absent flag is judged by what the
//! kubelet would actually do.

use crate::bench::{Check, CheckGroup, CheckItem, NodeProcess, Subject};
use crate::predicate::{FlagCheck, FlagPredicate};

fn flag(name: &str, predicate: FlagPredicate) -> Check {
    Check::Flag(FlagCheck::new(name, predicate))
}

fn flag_or(name: &str, predicate: FlagPredicate, default: &str) -> Check {
    Check::Flag(FlagCheck::new(name, predicate).with_default(default))
}

fn equals(value: &str) -> FlagPredicate {
    FlagPredicate::Equals(value.to_string())
}

/// Item groups for section 2.1.
pub fn groups() -> Vec<CheckGroup> {
    vec![CheckGroup::new(Some(NodeProcess::Kubelet), Subject::Flags)
        .item(CheckItem::scored(
            [2, 1, 1],
            "Ensure that the --allow-privileged argument is set to false",
            flag("allow-privileged", equals("false")),
        ))
        .item(CheckItem::scored(
            [2, 1, 2],
            "Ensure that the --anonymous-auth argument is set to false",
            flag_or("anonymous-auth", equals("false"), "true"),
        ))
        .item(CheckItem::scored(
            [2, 1, 3],
            "Ensure that the --authorization-mode argument is not set to AlwaysAllow",
            flag_or(
                "authorization-mode",
                FlagPredicate::ListExcludes("AlwaysAllow".to_string()),
                "AlwaysAllow",
            ),
        ))
        .item(CheckItem::scored(
            [2, 1, 4],
            "Ensure that the --client-ca-file argument is set as appropriate",
            flag("client-ca-file", FlagPredicate::IsSet),
        ))
        .item(CheckItem::scored(
            [2, 1, 5],
            "Ensure that the --read-only-port argument is set to 0",
            flag_or("read-only-port", equals("0"), "10255"),
        ))
        .item(CheckItem::scored(
            [2, 1, 6],
            "Ensure that the --streaming-connection-idle-timeout argument is not set to 0",
            flag_or(
                "streaming-connection-idle-timeout",
                FlagPredicate::NotEquals("0".to_string()),
                "4h0m0s",
            ),
        ))
        .item(CheckItem::scored(
            [2, 1, 7],
            "Ensure that the --protect-kernel-defaults argument is set to true",
            flag_or("protect-kernel-defaults", equals("true"), "false"),
        ))
        .item(CheckItem::scored(
            [2, 1, 8],
            "Ensure that the --make-iptables-util-chains argument is set to true",
            flag_or("make-iptables-util-chains", equals("true"), "true"),
        ))
        .item(CheckItem::scored(
            [2, 1, 9],
            "Ensure that the --hostname-override argument is not set",
            flag("hostname-override", FlagPredicate::IsNotSet),
        ))
        .item(CheckItem::not_scored(
            [2, 1, 10],
            "Ensure that the --event-qps argument is set to 0",
            flag_or("event-qps", equals("0"), "5"),
        ))]
}

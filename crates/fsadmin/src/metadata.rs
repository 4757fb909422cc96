//! Custom key/value metadata attached to subvolumes and their snapshots.

use crate::admin::{check_empty, FsAdmin};
use crate::command::{Command, CommonRmFlags};
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::response::Response;
use std::collections::BTreeMap;

/// What a metadata command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataTarget<'a> {
    /// A subvolume.
    SubVolume {
        volume: &'a str,
        group: Option<&'a str>,
        subvolume: &'a str,
    },
    /// A snapshot of a subvolume.
    Snapshot {
        volume: &'a str,
        group: Option<&'a str>,
        subvolume: &'a str,
        snapshot: &'a str,
    },
}

impl<'a> MetadataTarget<'a> {
    /// Address a subvolume.
    pub fn subvolume(volume: &'a str, group: Option<&'a str>, subvolume: &'a str) -> Self {
        MetadataTarget::SubVolume {
            volume,
            group,
            subvolume,
        }
    }

    /// Address a snapshot.
    pub fn snapshot(
        volume: &'a str,
        group: Option<&'a str>,
        subvolume: &'a str,
        snapshot: &'a str,
    ) -> Self {
        MetadataTarget::Snapshot {
            volume,
            group,
            subvolume,
            snapshot,
        }
    }

    fn command(&self, verb: &str) -> Command {
        match *self {
            MetadataTarget::SubVolume {
                volume,
                group,
                subvolume,
            } => Command::new(&format!("fs subvolume metadata {verb}"))
                .arg("vol_name", volume)
                .group(group)
                .arg("sub_name", subvolume),
            MetadataTarget::Snapshot {
                volume,
                group,
                subvolume,
                snapshot,
            } => Command::new(&format!("fs subvolume snapshot metadata {verb}"))
                .arg("vol_name", volume)
                .group(group)
                .arg("sub_name", subvolume)
                .arg("snap_name", snapshot),
        }
    }
}

/// Parse a `metadata ls` reply. An empty body means no keys.
pub fn parse_metadata_list(res: Response) -> Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    res.no_status().unmarshal(&mut entries).end()?;
    Ok(entries)
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Set a metadata key, replacing any previous value.
    pub fn set_metadata(&self, target: MetadataTarget<'_>, key: &str, value: &str) -> Result<()> {
        let cmd = target
            .command("set")
            .arg("key_name", key)
            .arg("value", value);
        check_empty(self.mgr(&cmd))
    }

    /// Read a metadata value.
    pub fn get_metadata(&self, target: MetadataTarget<'_>, key: &str) -> Result<String> {
        let cmd = target.command("get").arg("key_name", key);
        self.mgr(&cmd).no_status().text()
    }

    /// Remove a metadata key.
    pub fn remove_metadata(&self, target: MetadataTarget<'_>, key: &str) -> Result<()> {
        self.rm_metadata(target, key, CommonRmFlags::default())
    }

    /// Remove a metadata key, ignoring a missing one.
    pub fn force_remove_metadata(&self, target: MetadataTarget<'_>, key: &str) -> Result<()> {
        self.rm_metadata(target, key, CommonRmFlags { force: true })
    }

    fn rm_metadata(&self, target: MetadataTarget<'_>, key: &str, flags: CommonRmFlags) -> Result<()> {
        let cmd = target.command("rm").arg("key_name", key).flags(&flags);
        check_empty(self.mgr(&cmd))
    }

    /// All metadata keys with their values.
    pub fn list_metadata(&self, target: MetadataTarget<'_>) -> Result<BTreeMap<String, String>> {
        parse_metadata_list(self.mgr(&target.command("ls")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Reply, ReplayExecutor};
    use serde_json::json;

    #[test]
    fn test_subvolume_metadata_envelopes() {
        let exec = ReplayExecutor::with_replies(vec![
            Reply::empty(),
            Reply::with_body("hello\n"),
            Reply::with_body(r#"{"hi": "hello", "owner": "lab"}"#),
            Reply::empty(),
        ]);
        let fsa = FsAdmin::new(&exec);
        let target = MetadataTarget::subvolume("cephfs", Some("group"), "subVol");

        fsa.set_metadata(target, "hi", "hello").unwrap();
        assert_eq!(fsa.get_metadata(target, "hi").unwrap(), "hello");
        let all = fsa.list_metadata(target).unwrap();
        assert_eq!(all.get("owner").map(String::as_str), Some("lab"));
        fsa.force_remove_metadata(target, "hi").unwrap();

        let rec = exec.recorded();
        assert_eq!(
            rec[0].command,
            json!({
                "prefix": "fs subvolume metadata set",
                "format": "json",
                "vol_name": "cephfs",
                "group_name": "group",
                "sub_name": "subVol",
                "key_name": "hi",
                "value": "hello"
            })
        );
        assert_eq!(rec[3].prefix(), Some("fs subvolume metadata rm"));
        assert_eq!(rec[3].field("force"), Some(&json!(true)));
    }

    #[test]
    fn test_snapshot_metadata_envelopes() {
        let exec = ReplayExecutor::new();
        let fsa = FsAdmin::new(&exec);
        let target = MetadataTarget::snapshot("cephfs", None, "subVol", "snap1");
        fsa.set_metadata(target, "k", "v").unwrap();
        fsa.remove_metadata(target, "k").unwrap();

        let rec = exec.recorded();
        assert_eq!(rec[0].prefix(), Some("fs subvolume snapshot metadata set"));
        assert_eq!(rec[0].field("snap_name"), Some(&json!("snap1")));
        assert!(rec[0].field("group_name").is_none());
        assert!(rec[1].field("force").is_none());
    }

    #[test]
    fn test_list_metadata_empty_body() {
        let res = Response::from(Reply::empty());
        assert!(parse_metadata_list(res).unwrap().is_empty());
    }

    #[test]
    fn test_get_metadata_missing_key() {
        let exec = ReplayExecutor::with_replies(vec![Reply::failed(-2, "key 'nope' does not exist")]);
        let fsa = FsAdmin::new(&exec);
        let target = MetadataTarget::subvolume("cephfs", None, "subVol");
        assert!(fsa.get_metadata(target, "nope").unwrap_err().is_not_found());
    }
}

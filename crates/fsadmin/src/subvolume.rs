//! Subvolume management.
//!
//! A subvolume lives in a volume and optionally in a subvolume group; `None`
//! for the group selects the volume's default group.

use crate::admin::{check_empty, extract_path, parse_list_names, FsAdmin};
use crate::bytecount::{ByteCount, QuotaSize};
use crate::command::{Command, Mode, SubVolRmFlags};
use crate::error::{AdminError, Result};
use crate::executor::CommandExecutor;
use crate::response::Response;
use crate::timestamp::TimeStamp;
use serde::{Deserialize, Serialize};

/// Optional values used when creating a subvolume.
///
/// `None` fields are left out of the command. `Some` values are sent, except
/// that a zero size or zero mode is dropped unless `force` is set, so that the
/// manager's defaults apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubVolumeOptions {
    pub size: Option<ByteCount>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub mode: Option<Mode>,
    pub pool_layout: Option<String>,
    pub namespace_isolated: bool,
    pub force: bool,
}

impl SubVolumeOptions {
    /// Build the create command for `name`.
    pub fn to_command(&self, volume: &str, group: Option<&str>, name: &str) -> Command {
        let mut cmd = Command::new("fs subvolume create")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", name)
            .opt_arg("uid", self.uid)
            .opt_arg("gid", self.gid)
            .opt_arg("pool_layout", self.pool_layout.as_deref().filter(|p| !p.is_empty()))
            .flag("namespace_isolated", self.namespace_isolated);
        if let Some(size) = self.size {
            cmd = cmd.size("size", size, self.force);
        }
        if let Some(mode) = self.mode {
            cmd = cmd.mode("mode", mode, self.force);
        }
        cmd
    }
}

/// Sizes reported after a resize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubVolumeResizeResult {
    pub bytes_used: ByteCount,
    pub bytes_quota: QuotaSize,
    #[serde(rename = "bytes_pcent")]
    pub bytes_percent: String,
}

/// Informational values about a subvolume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubVolumeInfo {
    #[serde(rename = "type", default)]
    pub subvolume_type: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub mode: Mode,
    #[serde(rename = "bytes_pcent", default)]
    pub bytes_percent: String,
    #[serde(default)]
    pub bytes_used: ByteCount,
    pub bytes_quota: Option<QuotaSize>,
    #[serde(default)]
    pub data_pool: String,
    #[serde(default)]
    pub pool_namespace: String,
    pub atime: Option<TimeStamp>,
    pub mtime: Option<TimeStamp>,
    pub ctime: Option<TimeStamp>,
    pub created_at: Option<TimeStamp>,
    #[serde(default)]
    pub features: Vec<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub mon_addrs: Vec<String>,
}

impl SubVolumeInfo {
    /// True when the subvolume advertises `feature` (e.g. `snapshot-clone`).
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Parse a `fs subvolume info` reply.
pub fn parse_subvolume_info(res: Response) -> Result<SubVolumeInfo> {
    res.no_status().decode()
}

/// Parse a `fs subvolume resize` reply. The manager answers with a list of
/// single-key objects; older versions with a list holding one full record.
pub fn parse_resize_result(res: Response) -> Result<SubVolumeResizeResult> {
    let items: Vec<serde_json::Map<String, serde_json::Value>> = res.no_status().decode()?;
    let mut merged = serde_json::Map::new();
    for item in items {
        merged.extend(item);
    }
    if merged.is_empty() {
        return Err(AdminError::UnexpectedValue {
            field: "resize result",
            value: "[]".to_string(),
        });
    }
    let body = serde_json::Value::Object(merged);
    serde_json::from_value(body.clone()).map_err(|source| AdminError::Decode {
        source,
        body: body.to_string().into_bytes(),
    })
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Create a subvolume.
    pub fn create_subvolume(
        &self,
        volume: &str,
        group: Option<&str>,
        name: &str,
        opts: Option<&SubVolumeOptions>,
    ) -> Result<()> {
        let opts = opts.cloned().unwrap_or_default();
        check_empty(self.mgr(&opts.to_command(volume, group, name)))
    }

    /// List the subvolumes of a volume and group.
    pub fn list_subvolumes(&self, volume: &str, group: Option<&str>) -> Result<Vec<String>> {
        let cmd = Command::new("fs subvolume ls")
            .arg("vol_name", volume)
            .group(group);
        parse_list_names(self.mgr(&cmd))
    }

    /// Remove a subvolume.
    pub fn remove_subvolume(&self, volume: &str, group: Option<&str>, name: &str) -> Result<()> {
        self.remove_subvolume_with_flags(volume, group, name, SubVolRmFlags::default())
    }

    /// Remove a subvolume, ignoring a missing one. This is how a canceled or
    /// failed clone is cleaned up.
    pub fn force_remove_subvolume(
        &self,
        volume: &str,
        group: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let flags = SubVolRmFlags {
            force: true,
            ..SubVolRmFlags::default()
        };
        self.remove_subvolume_with_flags(volume, group, name, flags)
    }

    /// Remove a subvolume with explicit flags.
    pub fn remove_subvolume_with_flags(
        &self,
        volume: &str,
        group: Option<&str>,
        name: &str,
        flags: SubVolRmFlags,
    ) -> Result<()> {
        let cmd = Command::new("fs subvolume rm")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", name)
            .flags(&flags);
        check_empty(self.mgr(&cmd))
    }

    /// Resize a subvolume. With `no_shrink` the manager refuses to go below
    /// the bytes currently used.
    pub fn resize_subvolume(
        &self,
        volume: &str,
        group: Option<&str>,
        name: &str,
        new_size: QuotaSize,
        no_shrink: bool,
    ) -> Result<SubVolumeResizeResult> {
        let cmd = Command::new("fs subvolume resize")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", name)
            .arg("new_size", new_size.resize_value())
            .arg("no_shrink", no_shrink);
        parse_resize_result(self.mgr(&cmd))
    }

    /// Path of a subvolume relative to the file system root.
    pub fn subvolume_path(&self, volume: &str, group: Option<&str>, name: &str) -> Result<String> {
        let cmd = Command::new("fs subvolume getpath")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", name);
        extract_path(self.mgr(&cmd))
    }

    /// Informational values about a subvolume.
    pub fn subvolume_info(
        &self,
        volume: &str,
        group: Option<&str>,
        name: &str,
    ) -> Result<SubVolumeInfo> {
        let cmd = Command::new("fs subvolume info")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", name);
        parse_subvolume_info(self.mgr(&cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::executor::{ExecError, Reply, ReplayExecutor};
    use chrono::Datelike;
    use serde_json::json;

    const SAMPLE_INFO_1: &str = r#"
    {
        "atime": "2020-08-31 19:53:43",
        "bytes_pcent": "undefined",
        "bytes_quota": "infinite",
        "bytes_used": 0,
        "created_at": "2020-08-31 19:53:43",
        "ctime": "2020-08-31 19:57:15",
        "data_pool": "cephfs_data",
        "gid": 0,
        "mode": 16877,
        "mon_addrs": ["127.0.0.1:6789"],
        "mtime": "2020-08-31 19:53:43",
        "path": "/volumes/_nogroup/nibbles/df11be81-a648-4a7b-8549-f28306e3ad93",
        "pool_namespace": "",
        "type": "subvolume",
        "uid": 0
    }"#;

    const SAMPLE_INFO_2: &str = r#"
    {
        "atime": "2020-09-01 17:49:25",
        "bytes_pcent": "0.00",
        "bytes_quota": 444444,
        "bytes_used": 0,
        "created_at": "2020-09-01 17:49:25",
        "ctime": "2020-09-01 23:49:22",
        "data_pool": "cephfs_data",
        "gid": 0,
        "mode": 16877,
        "mtime": "2020-09-01 17:49:25",
        "path": "/volumes/_nogroup/nibbles/d6e062df-7fa0-46ca-872a-9adf728e0e00",
        "pool_namespace": "",
        "type": "subvolume",
        "uid": 0,
        "features": ["snapshot-clone", "snapshot-autoprotect"],
        "state": "complete"
    }"#;

    fn body(s: &str) -> Response {
        Response::from(Reply::with_body(s))
    }

    #[test]
    fn test_create_zero_size_omitted_without_force() {
        let opts = SubVolumeOptions {
            size: Some(ByteCount(0)),
            ..SubVolumeOptions::default()
        };
        let cmd = opts.to_command("cephfs", None, "sv");
        assert!(!cmd.contains("size"));
        assert!(!cmd.contains("group_name"));
    }

    #[test]
    fn test_create_zero_size_written_with_force() {
        let opts = SubVolumeOptions {
            size: Some(ByteCount(0)),
            mode: Some(Mode(0)),
            force: true,
            ..SubVolumeOptions::default()
        };
        let cmd = opts.to_command("cephfs", Some("grp"), "sv");
        assert_eq!(cmd.get("size"), Some(&json!(0)));
        assert_eq!(cmd.get("mode"), Some(&json!("0")));
        assert_eq!(cmd.get("group_name"), Some(&json!("grp")));
    }

    #[test]
    fn test_create_full_options() {
        let opts = SubVolumeOptions {
            size: Some(ByteCount::gib(5)),
            uid: Some(200),
            gid: Some(200),
            mode: Some(Mode(0o777)),
            pool_layout: Some(String::new()),
            namespace_isolated: true,
            force: false,
        };
        let cmd = opts.to_command("cephfs", None, "SubVol4");
        assert_eq!(
            cmd.to_value(),
            json!({
                "prefix": "fs subvolume create",
                "format": "json",
                "vol_name": "cephfs",
                "sub_name": "SubVol4",
                "size": 5368709120u64,
                "uid": 200,
                "gid": 200,
                "mode": "777",
                "namespace_isolated": true
            })
        );
    }

    #[test]
    fn test_parse_subvolume_info_error() {
        let err = parse_subvolume_info(Response::from(Reply::transport(ExecError::Io(
            "gleep glop".into(),
        ))))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_parse_subvolume_info_status_set() {
        let res = Response::from(Reply::with_status("unexpected!"));
        assert!(parse_subvolume_info(res).is_err());
    }

    #[test]
    fn test_parse_subvolume_info_infinite_quota() {
        let info = parse_subvolume_info(body(SAMPLE_INFO_1)).unwrap();
        assert_eq!(
            info.path,
            "/volumes/_nogroup/nibbles/df11be81-a648-4a7b-8549-f28306e3ad93"
        );
        assert_eq!(info.uid, 0);
        assert_eq!(info.bytes_quota, Some(QuotaSize::Infinite));
        assert_eq!(info.mode, Mode(0o40755));
        let ctime = info.ctime.unwrap();
        assert_eq!(ctime.year(), 2020);
        assert_eq!(ctime.to_string(), "2020-08-31 19:57:15");
        assert!(info.features.is_empty());
    }

    #[test]
    fn test_parse_subvolume_info_byte_quota() {
        let info = parse_subvolume_info(body(SAMPLE_INFO_2)).unwrap();
        assert_eq!(info.bytes_quota, Some(QuotaSize::Bytes(ByteCount(444444))));
        assert_eq!(info.ctime.unwrap().to_string(), "2020-09-01 23:49:22");
        assert!(info.has_feature("snapshot-clone"));
        assert_eq!(info.state.as_deref(), Some("complete"));
    }

    #[test]
    fn test_parse_subvolume_info_invalid_quota() {
        assert!(parse_subvolume_info(body(r#"{"bytes_quota": "fishy", "uid": 0}"#)).is_err());
        assert!(parse_subvolume_info(body(r#"{"bytes_quota": true, "uid": 0}"#)).is_err());
    }

    #[test]
    fn test_parse_resize_result_split_records() {
        let res = body(r#"[{"bytes_used": 0}, {"bytes_quota": 32212254720}, {"bytes_pcent": "0.00"}]"#);
        let rr = parse_resize_result(res).unwrap();
        assert_eq!(rr.bytes_used, ByteCount(0));
        assert_eq!(rr.bytes_quota, QuotaSize::Bytes(ByteCount::gib(30)));
        assert_eq!(rr.bytes_percent, "0.00");
    }

    #[test]
    fn test_parse_resize_result_infinite() {
        let res = body(r#"[{"bytes_used": 10, "bytes_quota": "infinite", "bytes_pcent": "undefined"}]"#);
        let rr = parse_resize_result(res).unwrap();
        assert_eq!(rr.bytes_quota, QuotaSize::Infinite);
    }

    #[test]
    fn test_parse_resize_result_empty_list() {
        let err = parse_resize_result(body("[]")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_subvolume_commands() {
        let exec = ReplayExecutor::with_replies(vec![
            Reply::empty(),
            Reply::with_body(r#"[{"name":"SubVol1"}]"#),
            Reply::with_body(r#"[{"bytes_used": 0}, {"bytes_quota": "infinite"}, {"bytes_pcent": "undefined"}]"#),
            Reply::with_body("/volumes/grp/SubVol1/uuid"),
            Reply::empty(),
        ]);
        let fsa = FsAdmin::new(&exec);
        fsa.create_subvolume("cephfs", Some("grp"), "SubVol1", None).unwrap();
        assert_eq!(fsa.list_subvolumes("cephfs", Some("grp")).unwrap(), vec!["SubVol1"]);
        let rr = fsa
            .resize_subvolume("cephfs", Some("grp"), "SubVol1", QuotaSize::Infinite, true)
            .unwrap();
        assert_eq!(rr.bytes_quota, QuotaSize::Infinite);
        let path = fsa.subvolume_path("cephfs", Some("grp"), "SubVol1").unwrap();
        assert!(path.contains("grp") && path.contains("SubVol1"));
        fsa.force_remove_subvolume("cephfs", Some("grp"), "SubVol1").unwrap();

        let rec = exec.recorded();
        assert_eq!(rec[2].field("new_size"), Some(&json!("infinite")));
        assert_eq!(rec[2].field("no_shrink"), Some(&json!(true)));
        assert_eq!(rec[4].field("force"), Some(&json!(true)));
        assert!(rec[4].field("retain_snapshots").is_none());
    }

    #[test]
    fn test_subvolume_path_missing_subvolume() {
        let exec = ReplayExecutor::with_replies(vec![Reply::failed(-2, "subvolume 'oops' does not exist")]);
        let fsa = FsAdmin::new(&exec);
        let err = fsa.subvolume_path("cephfs", None, "oops").unwrap_err();
        assert!(err.is_not_found());
    }
}

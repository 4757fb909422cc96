use crate::admin::{check_empty, extract_path, parse_list_names, FsAdmin};
use crate::bytecount::ByteCount;
use crate::command::{Command, CommonRmFlags, Mode};
use crate::error::Result;
use crate::executor::CommandExecutor;

/// Optional values used when creating a subvolume group.
///
/// `None` fields are left out of the command. A `Some` zero size or mode is
/// only sent when `force` is set; otherwise the manager's default applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubVolumeGroupOptions {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub mode: Option<Mode>,
    pub pool_layout: Option<String>,
    pub size: Option<ByteCount>,
    pub force: bool,
}

impl SubVolumeGroupOptions {
    fn to_command(&self, volume: &str, name: &str) -> Command {
        let mut cmd = Command::new("fs subvolumegroup create")
            .arg("vol_name", volume)
            .arg("group_name", name)
            .opt_arg("uid", self.uid)
            .opt_arg("gid", self.gid)
            .opt_arg("pool_layout", self.pool_layout.as_deref().filter(|p| !p.is_empty()));
        if let Some(mode) = self.mode {
            cmd = cmd.mode("mode", mode, self.force);
        }
        if let Some(size) = self.size {
            cmd = cmd.size("size", size, self.force);
        }
        cmd
    }
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Create a subvolume group in a volume.
    pub fn create_subvolume_group(
        &self,
        volume: &str,
        name: &str,
        opts: Option<&SubVolumeGroupOptions>,
    ) -> Result<()> {
        let opts = opts.cloned().unwrap_or_default();
        check_empty(self.mgr(&opts.to_command(volume, name)))
    }

    /// List the subvolume groups of a volume.
    pub fn list_subvolume_groups(&self, volume: &str) -> Result<Vec<String>> {
        parse_list_names(self.mgr(&Command::new("fs subvolumegroup ls").arg("vol_name", volume)))
    }

    /// Remove a subvolume group.
    pub fn remove_subvolume_group(&self, volume: &str, name: &str) -> Result<()> {
        self.rm_subvolume_group(volume, name, CommonRmFlags::default())
    }

    /// Remove a subvolume group, ignoring a missing group.
    pub fn force_remove_subvolume_group(&self, volume: &str, name: &str) -> Result<()> {
        self.rm_subvolume_group(volume, name, CommonRmFlags { force: true })
    }

    fn rm_subvolume_group(&self, volume: &str, name: &str, flags: CommonRmFlags) -> Result<()> {
        let cmd = Command::new("fs subvolumegroup rm")
            .arg("vol_name", volume)
            .arg("group_name", name)
            .flags(&flags);
        check_empty(self.mgr(&cmd))
    }

    /// Path of a subvolume group relative to the file system root.
    pub fn subvolume_group_path(&self, volume: &str, name: &str) -> Result<String> {
        let cmd = Command::new("fs subvolumegroup getpath")
            .arg("vol_name", volume)
            .arg("group_name", name);
        extract_path(self.mgr(&cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Reply, ReplayExecutor};
    use serde_json::json;

    #[test]
    fn test_group_defaults_omit_optional_fields() {
        let cmd = SubVolumeGroupOptions::default().to_command("cephfs", "park");
        assert_eq!(
            cmd.to_value(),
            json!({
                "prefix": "fs subvolumegroup create",
                "format": "json",
                "vol_name": "cephfs",
                "group_name": "park"
            })
        );
    }

    #[test]
    fn test_group_options_serialize() {
        let opts = SubVolumeGroupOptions {
            uid: Some(200),
            gid: Some(0),
            mode: Some(Mode(0o750)),
            pool_layout: Some("fast".into()),
            size: Some(ByteCount::gib(1)),
            force: false,
        };
        let cmd = opts.to_command("cephfs", "park");
        assert_eq!(cmd.get("uid"), Some(&json!(200)));
        assert_eq!(cmd.get("gid"), Some(&json!(0)));
        assert_eq!(cmd.get("mode"), Some(&json!("750")));
        assert_eq!(cmd.get("pool_layout"), Some(&json!("fast")));
        assert_eq!(cmd.get("size"), Some(&json!(1073741824u64)));
    }

    #[test]
    fn test_group_lifecycle_commands() {
        let exec = ReplayExecutor::with_replies(vec![
            Reply::empty(),
            Reply::with_body(r#"[{"name":"park"},{"name":"zoo"}]"#),
            Reply::with_body("/volumes/park"),
            Reply::empty(),
        ]);
        let fsa = FsAdmin::new(&exec);
        fsa.create_subvolume_group("cephfs", "park", None).unwrap();
        assert_eq!(fsa.list_subvolume_groups("cephfs").unwrap(), vec!["park", "zoo"]);
        assert_eq!(fsa.subvolume_group_path("cephfs", "park").unwrap(), "/volumes/park");
        fsa.force_remove_subvolume_group("cephfs", "park").unwrap();

        let rec = exec.recorded();
        assert_eq!(rec[3].prefix(), Some("fs subvolumegroup rm"));
        assert_eq!(rec[3].field("force"), Some(&json!(true)));
    }

    #[test]
    fn test_group_remove_rejects_status() {
        let exec = ReplayExecutor::with_replies(vec![Reply::with_status("group busy")]);
        let fsa = FsAdmin::new(&exec);
        assert!(fsa.remove_subvolume_group("cephfs", "park").is_err());
        assert!(exec.recorded()[0].field("force").is_none());
    }
}

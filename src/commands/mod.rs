use std::sync::OnceLock;

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::transport::IMAGE_SLOTS;

/// Camera directions the nodes accept.
pub const CAM_DIRECTIONS: &[&str] = &["up", "down", "left", "right"];

/// One user-issued command, named after the server's `/data/{subject}`
/// routes.
#[derive(Debug, Clone)]
pub enum WebCommand {
    Route(RouteCommand),
    Shell(ShellCommand),
    Config(ConfigCommand),
    Reboot(NodeTarget),
    Reload(NodeTarget),
    Reset,
    Configure(ConfigureCommand),
    MoveCam(MoveCamCommand),
}

impl WebCommand {
    pub fn subject(&self) -> &'static str {
        match self {
            WebCommand::Route(_) => "route",
            WebCommand::Shell(_) => "shell",
            WebCommand::Config(_) => "config",
            WebCommand::Reboot(_) => "reboot",
            WebCommand::Reload(_) => "reload",
            WebCommand::Reset => "reset",
            WebCommand::Configure(_) => "configure",
            WebCommand::MoveCam(_) => "move-cam",
        }
    }

    /// Pre-flight checks mirroring the server's own rejections, so an
    /// obviously bad command fails before it goes on the wire. The server
    /// still has the final say; its verdict arrives as an alert.
    pub fn validate(&self) -> Result<()> {
        match self {
            WebCommand::Route(c) => c.validate(),
            WebCommand::Shell(c) => c.validate(),
            WebCommand::Config(c) => c.validate(),
            WebCommand::Configure(c) => c.validate(),
            WebCommand::MoveCam(c) => c.validate(),
            WebCommand::Reboot(_) | WebCommand::Reload(_) | WebCommand::Reset => Ok(()),
        }
    }

    /// The JSON body posted to `/data/{subject}`.
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            WebCommand::Route(c) => serde_json::to_value(c)?,
            WebCommand::Shell(c) => serde_json::to_value(c)?,
            WebCommand::Config(c) => serde_json::to_value(c)?,
            WebCommand::Reboot(c) | WebCommand::Reload(c) => serde_json::to_value(c)?,
            WebCommand::Reset => Value::Object(Default::default()),
            WebCommand::Configure(c) => serde_json::to_value(c)?,
            WebCommand::MoveCam(c) => serde_json::to_value(c)?,
        };
        Ok(value)
    }
}

/// Reroute a node through the mesh. The route is a string of node ids
/// ending at the target.
#[derive(Debug, Clone, Serialize)]
pub struct RouteCommand {
    pub id: String,
    pub route: String,
}

impl RouteCommand {
    pub fn new(id: impl Into<String>, route: &str) -> Self {
        Self {
            id: id.into(),
            route: normalize_route(route),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.route.is_empty() {
            bail!("route is empty");
        }
        if !self.route.ends_with(&self.id) {
            bail!("route must end at node {}", self.id);
        }
        for (i, n) in self.route.char_indices() {
            if self.route[i + n.len_utf8()..].contains(n) {
                bail!("duplicate node '{}' in route", n);
            }
        }
        Ok(())
    }
}

/// Route strings arrive in display form ("@ <-> 1 <-> 3"); strip the
/// separators down to the bare node ids, as the server does.
fn normalize_route(raw: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATORS.get_or_init(|| Regex::new(r"[@\-<>\s]").unwrap());
    re.replace_all(raw, "").into_owned()
}

/// Run a shell script on a node. Output comes back through the root's
/// log, not through this channel.
#[derive(Debug, Clone, Serialize)]
pub struct ShellCommand {
    pub id: String,
    pub script: String,
}

impl ShellCommand {
    pub fn new(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: script.into().trim().to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.script.is_empty() {
            bail!("shell script is empty");
        }
        Ok(())
    }
}

/// Push a full node configuration object.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigCommand {
    pub id: String,
    pub conf: Value,
}

impl ConfigCommand {
    fn validate(&self) -> Result<()> {
        if !self.conf.is_object() {
            bail!("config payload must be a JSON object");
        }
        Ok(())
    }
}

/// Payload for commands that only name a node (`reboot`, `reload`).
#[derive(Debug, Clone, Serialize)]
pub struct NodeTarget {
    pub id: String,
}

/// Assign a node a new single-character id.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureCommand {
    pub id: String,
    pub new_id: String,
}

impl ConfigureCommand {
    fn validate(&self) -> Result<()> {
        if self.new_id.chars().count() != 1 {
            bail!("new id must be a single character");
        }
        if self.new_id == self.id {
            bail!("new id matches the current id");
        }
        Ok(())
    }
}

/// Step a node's camera in one direction.
#[derive(Debug, Clone, Serialize)]
pub struct MoveCamCommand {
    pub id: String,
    pub cam: u8,
    pub dir: String,
}

impl MoveCamCommand {
    fn validate(&self) -> Result<()> {
        if usize::from(self.cam) >= IMAGE_SLOTS {
            bail!("camera slot {} out of range", self.cam);
        }
        if !CAM_DIRECTIONS.contains(&self.dir.as_str()) {
            bail!("unknown camera direction '{}'", self.dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subjects_match_server_routes() {
        assert_eq!(
            WebCommand::Shell(ShellCommand::new("3", "ls")).subject(),
            "shell"
        );
        assert_eq!(WebCommand::Reset.subject(), "reset");
        assert_eq!(
            WebCommand::MoveCam(MoveCamCommand {
                id: "3".into(),
                cam: 0,
                dir: "up".into()
            })
            .subject(),
            "move-cam"
        );
    }

    #[test]
    fn shell_payload_wire_shape() {
        let cmd = WebCommand::Shell(ShellCommand::new("42", "ls"));
        assert_eq!(cmd.payload().unwrap(), json!({"id": "42", "script": "ls"}));
    }

    #[test]
    fn route_payload_wire_shape() {
        let cmd = WebCommand::Route(RouteCommand::new("3", "13"));
        assert_eq!(cmd.payload().unwrap(), json!({"id": "3", "route": "13"}));
    }

    #[test]
    fn config_payload_wire_shape() {
        let cmd = WebCommand::Config(ConfigCommand {
            id: "3".into(),
            conf: json!({"about": {"name": "porch"}}),
        });
        assert_eq!(
            cmd.payload().unwrap(),
            json!({"id": "3", "conf": {"about": {"name": "porch"}}})
        );
    }

    #[test]
    fn reset_payload_is_empty_object() {
        assert_eq!(WebCommand::Reset.payload().unwrap(), json!({}));
    }

    #[test]
    fn route_display_form_is_normalized() {
        let cmd = RouteCommand::new("3", "@ <-> 1 <-> 3");
        assert_eq!(cmd.route, "13");
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn route_must_end_at_target() {
        let cmd = RouteCommand::new("3", "31");
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn route_rejects_duplicates_and_empty() {
        assert!(RouteCommand::new("3", "313").validate().is_err());
        assert!(RouteCommand::new("3", "@ <-> ").validate().is_err());
    }

    #[test]
    fn shell_rejects_blank_script() {
        let cmd = WebCommand::Shell(ShellCommand::new("3", "   "));
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn configure_requires_fresh_single_char_id() {
        let ok = ConfigureCommand {
            id: "3".into(),
            new_id: "4".into(),
        };
        assert!(ok.validate().is_ok());

        let same = ConfigureCommand {
            id: "3".into(),
            new_id: "3".into(),
        };
        assert!(same.validate().is_err());

        let long = ConfigureCommand {
            id: "3".into(),
            new_id: "44".into(),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn move_cam_bounds_and_directions() {
        let ok = MoveCamCommand {
            id: "3".into(),
            cam: 5,
            dir: "left".into(),
        };
        assert!(ok.validate().is_ok());

        let bad_slot = MoveCamCommand {
            id: "3".into(),
            cam: 6,
            dir: "left".into(),
        };
        assert!(bad_slot.validate().is_err());

        let bad_dir = MoveCamCommand {
            id: "3".into(),
            cam: 0,
            dir: "sideways".into(),
        };
        assert!(bad_dir.validate().is_err());
    }

    #[test]
    fn config_must_be_object() {
        let cmd = ConfigCommand {
            id: "3".into(),
            conf: json!("not an object"),
        };
        assert!(cmd.validate().is_err());
    }
}

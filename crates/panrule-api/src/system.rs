// Operational endpoints
//
// Appliance identification and audit comments. Both go through `type=op`.

use tracing::debug;

use crate::platform::Platform;
use crate::client::XmlApiClient;
use crate::error::Error;
use crate::xml::XmlNode;

/// Subset of `show system info` used to identify the appliance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemInfo {
    pub hostname: String,
    pub model: String,
    pub serial: String,
    pub sw_version: String,
    pub multi_vsys: bool,
}

impl SystemInfo {
    /// Build from the `<result>` of `show system info`.
    pub fn from_result(result: &XmlNode) -> Result<Self, Error> {
        let system = result.get_child("system").ok_or_else(|| Error::Malformed {
            message: "show system info returned no <system> element".into(),
            body: String::new(),
        })?;
        let text = |tag: &str| system.get_text(&[tag]).unwrap_or_default().to_owned();

        Ok(Self {
            hostname: text("hostname"),
            model: text("model"),
            serial: text("serial"),
            sw_version: text("sw-version"),
            multi_vsys: system.get_text(&["multi-vsys"]) == Some("on"),
        })
    }

    pub fn platform(&self) -> Platform {
        Platform::from_model(&self.model)
    }
}

impl XmlApiClient {
    /// Run `show system info`.
    pub async fn system_info(&self) -> Result<SystemInfo, Error> {
        let cmd = XmlNode::new("show").with_child(XmlNode::new("system").with_child(XmlNode::new("info")));
        let result = self.op(&cmd).await?;
        let info = SystemInfo::from_result(&result)?;
        debug!(hostname = %info.hostname, model = %info.model, version = %info.sw_version, "system info");
        Ok(info)
    }

    /// Identify whether the appliance is a firewall or Panorama.
    pub async fn detect_platform(&self) -> Result<Platform, Error> {
        Ok(self.system_info().await?.platform())
    }

    /// Attach an audit comment to the configuration object at `xpath`.
    pub async fn set_audit_comment(&self, xpath: &str, comment: &str) -> Result<(), Error> {
        debug!(xpath, "setting audit comment");
        let cmd = XmlNode::new("set").with_child(
            XmlNode::new("audit-comment")
                .with_child(XmlNode::leaf("xpath", xpath))
                .with_child(XmlNode::leaf("comment", comment)),
        );
        self.op(&cmd).await?;
        Ok(())
    }
}

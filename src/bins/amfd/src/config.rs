//! AMF Configuration
//!
//! Loads the `amf:` section of the YAML configuration file. Every key is
//! optional; anything absent keeps its default.

use anyhow::Result;
use serde_yaml::Value;

use amf_ngap::{Guami, PlmnId, PlmnSupportItem, SNssai};

use crate::context::{OperatorInfo, Tai5gs, MAX_NUM_OF_RAN, MAX_NUM_OF_RAN_UE};
use crate::ngap_path::DEFAULT_NGAP_ADDR;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/amfd/amf.yaml";

/// Default number of runtime worker threads
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct AmfConfig {
    pub operator: OperatorInfo,
    pub ngap_addr: String,
    pub workers: usize,
    pub max_ran: usize,
    pub max_ran_ue: usize,
}

impl Default for AmfConfig {
    fn default() -> Self {
        Self {
            operator: OperatorInfo::default(),
            ngap_addr: DEFAULT_NGAP_ADDR.to_string(),
            workers: DEFAULT_WORKERS,
            max_ran: MAX_NUM_OF_RAN,
            max_ran_ue: MAX_NUM_OF_RAN_UE,
        }
    }
}

impl AmfConfig {
    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn load(config_path: &str) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path);

        let content = match std::fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Could not read config file '{}': {}. Using defaults.", config_path, e);
                return Ok(Self::default());
            }
        };
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: Value = serde_yaml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse YAML config: {}", e))?;

        let mut config = Self::default();
        let amf_section = match yaml.get("amf") {
            Some(section) => section,
            None => {
                log::warn!("No 'amf' section in config file");
                return Ok(config);
            }
        };

        let operator = &mut config.operator;

        if let Some(name) = amf_section.get("amf_name").and_then(|v| v.as_str()) {
            operator.amf_name = name.to_string();
        }
        if let Some(capacity) = amf_section.get("relative_capacity").and_then(|v| v.as_u64()) {
            if capacity > u8::MAX as u64 {
                anyhow::bail!("relative_capacity {} out of range (0..255)", capacity);
            }
            operator.relative_capacity = capacity as u8;
        }

        // A single GUAMI, or the first of a list
        let guami_entry = match amf_section.get("guami") {
            Some(Value::Sequence(list)) => list.first(),
            other => other,
        };
        if let Some(entry) = guami_entry {
            operator.guami = parse_guami(entry)
                .ok_or_else(|| anyhow::anyhow!("Invalid 'guami' entry"))?;
        }

        if let Some(tai_list) = amf_section.get("tai").and_then(|v| v.as_sequence()) {
            operator.tai_list = tai_list.iter().filter_map(parse_tai).collect();
        }

        if let Some(plmn_list) = amf_section.get("plmn_support").and_then(|v| v.as_sequence()) {
            operator.plmn_support = plmn_list.iter().filter_map(parse_plmn_support).collect();
        }

        if let Some(addr) = amf_section
            .get("ngap")
            .and_then(|ngap| ngap.get("addr"))
            .and_then(|v| v.as_str())
        {
            config.ngap_addr = addr.to_string();
        }
        if let Some(workers) = amf_section.get("workers").and_then(|v| v.as_u64()) {
            config.workers = workers as usize;
        }
        if let Some(max_ran) = amf_section.get("max_ran").and_then(|v| v.as_u64()) {
            config.max_ran = max_ran as usize;
        }
        if let Some(max_ran_ue) = amf_section.get("max_ran_ue").and_then(|v| v.as_u64()) {
            config.max_ran_ue = max_ran_ue as usize;
        }

        log::info!(
            "AMF configuration loaded: name={}, GUAMI PLMN {}, {} TAI, {} PLMN support",
            config.operator.amf_name,
            config.operator.guami.plmn_id,
            config.operator.tai_list.len(),
            config.operator.plmn_support.len()
        );
        Ok(config)
    }
}

/// Accept a YAML number or string and return its decimal digits
fn digits(value: &Value) -> Option<String> {
    value
        .as_u64()
        .map(|n| n.to_string())
        .or_else(|| value.as_str().map(|s| s.to_string()))
}

fn parse_plmn_id(plmn_value: Option<&Value>) -> Option<PlmnId> {
    let plmn = plmn_value?;
    let mcc = plmn.get("mcc").and_then(digits)?;
    let mnc = plmn.get("mnc").and_then(digits)?;
    Some(PlmnId::new(&mcc, &mnc))
}

fn parse_guami(entry: &Value) -> Option<Guami> {
    let plmn_id = parse_plmn_id(entry.get("plmn_id"))?;

    let amf_id = entry.get("amf_id")?;
    let region = amf_id.get("region").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
    let set = amf_id.get("set").and_then(|v| v.as_u64()).unwrap_or(0) as u16;
    let pointer = amf_id.get("pointer").and_then(|v| v.as_u64()).unwrap_or(0) as u8;

    Some(Guami {
        plmn_id,
        amf_region_id: region,
        amf_set_id: set & 0x3ff,
        amf_pointer: pointer & 0x3f,
    })
}

fn parse_tai(entry: &Value) -> Option<Tai5gs> {
    let plmn_id = parse_plmn_id(entry.get("plmn_id"))?;
    let tac = entry.get("tac").and_then(|v| v.as_u64())?;
    Some(Tai5gs::new(plmn_id, tac as u32 & 0x00ff_ffff))
}

/// SD as a number (`0x010203`) or a 6-digit hex string (`"010203"`)
fn parse_sd(value: &Value) -> Option<[u8; 3]> {
    let sd = match value {
        Value::Number(n) => n.as_u64()? as u32,
        Value::String(s) => u32::from_str_radix(s.trim_start_matches("0x"), 16).ok()?,
        _ => return None,
    };
    let [_, b0, b1, b2] = sd.to_be_bytes();
    Some([b0, b1, b2])
}

fn parse_plmn_support(entry: &Value) -> Option<PlmnSupportItem> {
    let plmn_id = parse_plmn_id(entry.get("plmn_id"))?;

    let mut slice_support_list = Vec::new();
    if let Some(s_nssai_array) = entry.get("s_nssai").and_then(|v| v.as_sequence()) {
        for s_nssai_entry in s_nssai_array {
            let sst = s_nssai_entry.get("sst").and_then(|v| v.as_u64()).unwrap_or(1) as u8;
            let sd = s_nssai_entry.get("sd").and_then(parse_sd);
            slice_support_list.push(SNssai { sst, sd });
        }
    }

    Some(PlmnSupportItem {
        plmn_id,
        slice_support_list,
    })
}

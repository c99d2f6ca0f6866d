//! Platform JSON parsing, grounded on spec.md §6 "Platform JSON" and
//! `Simulator._build_library`: a type library merged from one or more
//! library files, plus a per-run topology description that instantiates
//! types from it.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ErrorKind, Kind as _, Result};
use crate::platform::contention::{PowerConstants, QuadraticPowerConstants, SigmoidConstants, SmootherstepConstants};

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorType {
    pub clock_rate: f64,
    pub dpflops_per_cycle: f64,
    pub cores: u32,
    pub dynamic_power: f64,
    pub static_power: f64,
    pub min_power: f64,
    pub b: f64,
    pub c: f64,
    pub da: f64,
    pub db: f64,
    pub dc: f64,
    pub dd: f64,
}

impl ProcessorType {
    pub fn smootherstep(&self) -> SmootherstepConstants {
        SmootherstepConstants { b: self.b, c: self.c, da: self.da, db: self.db, dc: self.dc, dd: self.dd }
    }

    pub fn power(&self) -> PowerConstants {
        PowerConstants { dynamic_power: self.dynamic_power, static_power: self.static_power, min_power: self.min_power }
    }

    pub fn mops_per_core(&self) -> f64 {
        self.clock_rate * self.dpflops_per_cycle * 1e3
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "contention_model", rename_all = "snake_case")]
pub enum NodeType {
    Smootherstep {
        clock_rate: f64,
        cores: u32,
        dynamic_power: f64,
        static_power: f64,
        min_power: f64,
        b: f64,
        c: f64,
        da: f64,
        db: f64,
        dc: f64,
        dd: f64,
    },
    Sigmoid {
        clock_rate: f64,
        cores: u32,
        aaa: f64,
        aab: f64,
        aba: f64,
        abb: f64,
        baa: f64,
        bab: f64,
        bba: f64,
        bbb: f64,
        caa: f64,
        cab: f64,
        cba: f64,
        cbb: f64,
        cca: f64,
        ccb: f64,
        daa: f64,
        dab: f64,
        dba: f64,
        dbb: f64,
        pidle: f64,
        p00: f64,
        p01: f64,
        p02: f64,
        p10: f64,
        p11: f64,
        p20: f64,
    },
}

impl NodeType {
    pub fn cores(&self) -> u32 {
        match self {
            NodeType::Smootherstep { cores, .. } => *cores,
            NodeType::Sigmoid { cores, .. } => *cores,
        }
    }

    pub fn gops(&self) -> f64 {
        match self {
            NodeType::Smootherstep { clock_rate, .. } => *clock_rate,
            NodeType::Sigmoid { clock_rate, .. } => *clock_rate,
        }
    }

    pub fn sigmoid_constants(&self) -> Option<SigmoidConstants> {
        match self {
            NodeType::Sigmoid {
                aaa, aab, aba, abb, baa, bab, bba, bbb, caa, cab, cba, cbb, cca, ccb, daa, dab, dba, dbb, ..
            } => Some(SigmoidConstants {
                aaa: *aaa, aab: *aab, aba: *aba, abb: *abb, baa: *baa, bab: *bab, bba: *bba, bbb: *bbb,
                caa: *caa, cab: *cab, cba: *cba, cbb: *cbb, cca: *cca, ccb: *ccb, daa: *daa, dab: *dab,
                dba: *dba, dbb: *dbb,
            }),
            _ => None,
        }
    }

    pub fn quadratic_power(&self) -> Option<QuadraticPowerConstants> {
        match self {
            NodeType::Sigmoid { pidle, p00, p01, p02, p10, p11, p20, .. } => Some(QuadraticPowerConstants {
                pidle: *pidle, p00: *p00, p01: *p01, p02: *p02, p10: *p10, p11: *p11, p20: *p20,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeLibrary {
    #[serde(default)]
    pub processor: HashMap<String, ProcessorType>,
    #[serde(default)]
    pub node: HashMap<String, NodeType>,
}

impl TypeLibrary {
    /// Merges the four conventional library files (`platforms.json` is a
    /// description, not a library, and is loaded separately) under
    /// `library_path`, following `Simulator._build_library`. Missing
    /// files are tolerated -- a platform using only one model variant
    /// need not ship an unused library.
    pub fn load(library_path: &Path) -> Result<Self> {
        let mut merged = TypeLibrary::default();
        for file in ["node_types.json", "processor_types.json"] {
            let path = library_path.join(file);
            if !path.exists() {
                continue;
            }
            let contents = std::fs::read_to_string(&path).kind(ErrorKind::PlatformLoad)?;
            let partial: TypeLibrary = serde_json::from_str(&contents).kind(ErrorKind::PlatformLoad)?;
            merged.processor.extend(partial.processor);
            merged.node.extend(partial.node);
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorDescription {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "one")]
    pub number: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeDescription {
    pub id: String,
    #[serde(default = "one")]
    pub number: u32,
    /// present for v1_1/v2, where the node is itself the leaf
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// present for v1, where the node owns typed processors
    #[serde(default)]
    pub processors: Vec<ProcessorDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterDescription {
    pub id: String,
    #[serde(default = "one")]
    pub number: u32,
    pub nodes: Vec<NodeDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformDescription {
    pub id: String,
    pub model_name: String,
    pub clusters: Vec<ClusterDescription>,
}

fn one() -> u32 {
    1
}

impl PlatformDescription {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).kind(ErrorKind::PlatformLoad)?;
        serde_json::from_str(&contents).kind(ErrorKind::PlatformLoad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_v1_platform_description() {
        let json = r#"
        {
          "id": "platform",
          "model_name": "modelV1",
          "clusters": [
            {
              "id": "cluster",
              "nodes": [
                { "id": "node", "processors": [ { "id": "proc", "type": "generic" } ] }
              ]
            }
          ]
        }"#;
        let desc: PlatformDescription = serde_json::from_str(json).unwrap();
        assert_eq!(desc.model_name, "modelV1");
        assert_eq!(desc.clusters[0].nodes[0].processors[0].type_name, "generic");
    }
}

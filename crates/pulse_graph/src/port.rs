// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions and the values that flow through them.

use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Kind of external resource a handle refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Mesh geometry
    Geometry,
    /// Surface material
    Material,
    /// Scene object
    Object,
    /// Image or render target
    Texture,
    /// Audio stream
    Stream,
    /// Anything a node-type module defines on its own
    Custom(String),
}

/// Opaque handle to a resource owned by an external collaborator.
///
/// The runtime never looks inside a handle. Whoever issued it is
/// responsible for releasing it when the owning node is disposed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// What the handle points at
    pub kind: ResourceKind,
    /// Collaborator-assigned key
    pub id: u64,
}

impl ResourceHandle {
    /// Create a new handle
    pub fn new(kind: ResourceKind, id: u64) -> Self {
        Self { kind, id }
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Scalar number
    Number,
    /// Numeric array (positions, scales, spectra)
    Array,
    /// Text value
    Text,
    /// Handle to an external resource
    Resource(ResourceKind),
    /// Any type (for generic nodes)
    Any,
}

impl PortType {
    /// Value an unconnected, unparameterized input of this type reads as
    pub fn neutral(&self) -> &'static PortValue {
        match self {
            Self::Number | Self::Any => &ZERO,
            Self::Array | Self::Text | Self::Resource(_) => &EMPTY,
        }
    }

    /// Whether a missing upstream value falls back to the node's own parameter
    pub fn falls_back_to_param(&self) -> bool {
        matches!(self, Self::Number | Self::Any)
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }
        self == other
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique among the node's ports of the same direction
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
        }
    }

    /// Check if a connection to another port is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if self.direction == other.direction {
            return false;
        }
        self.port_type.can_connect_to(&other.port_type)
    }
}

pub(crate) static ZERO: PortValue = PortValue::Number(0.0);
pub(crate) static EMPTY: PortValue = PortValue::Empty;

/// Value that can be stored in a port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Nothing (disconnected resource, not yet produced)
    #[default]
    Empty,
    /// Scalar number
    Number(f64),
    /// Numeric array
    Array(Vec<f64>),
    /// Text
    Text(String),
    /// External resource
    Resource(ResourceHandle),
}

impl PortValue {
    /// Get the port type for this value, `None` for `Empty`
    pub fn port_type(&self) -> Option<PortType> {
        match self {
            Self::Empty => None,
            Self::Number(_) => Some(PortType::Number),
            Self::Array(_) => Some(PortType::Array),
            Self::Text(_) => Some(PortType::Text),
            Self::Resource(handle) => Some(PortType::Resource(handle.kind.clone())),
        }
    }

    /// Numeric view: numbers as-is, everything else as zero
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(v) => *v,
            _ => 0.0,
        }
    }

    /// Array view, if this is an array
    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Resource view, if this is a handle
    pub fn as_resource(&self) -> Option<&ResourceHandle> {
        match self {
            Self::Resource(handle) => Some(handle),
            _ => None,
        }
    }

    /// True for `Empty`
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<f64> for PortValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<f64>> for PortValue {
    fn from(value: Vec<f64>) -> Self {
        Self::Array(value)
    }
}

impl From<ResourceHandle> for PortValue {
    fn from(value: ResourceHandle) -> Self {
        Self::Resource(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_defaults() {
        assert_eq!(PortType::Number.neutral(), &PortValue::Number(0.0));
        assert_eq!(PortType::Array.neutral(), &PortValue::Empty);
        assert_eq!(
            PortType::Resource(ResourceKind::Texture).neutral(),
            &PortValue::Empty
        );
    }

    #[test]
    fn test_port_compatibility() {
        let out = Port::output("Out", PortType::Number);
        let num_in = Port::input("In", PortType::Number);
        let geo_in = Port::input("Geo", PortType::Resource(ResourceKind::Geometry));
        let any_in = Port::input("Any", PortType::Any);

        assert!(out.can_connect(&num_in));
        assert!(out.can_connect(&any_in));
        assert!(!out.can_connect(&geo_in));
        assert!(!num_in.can_connect(&geo_in));
    }

    #[test]
    fn test_value_views() {
        let handle = ResourceHandle::new(ResourceKind::Geometry, 7);
        let value = PortValue::from(handle.clone());
        assert_eq!(value.as_resource(), Some(&handle));
        assert_eq!(value.as_number(), 0.0);
        assert_eq!(PortValue::from(2.5).as_number(), 2.5);
        assert_eq!(PortValue::from(vec![1.0, 2.0]).as_array(), Some(&[1.0, 2.0][..]));
        assert_eq!(
            value.port_type(),
            Some(PortType::Resource(ResourceKind::Geometry))
        );
        assert!(PortValue::default().is_empty());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signal sources: pointer, oscillators, noise, beat clock, grids.

use crate::evaluation::{BehaviorError, FrameContext, NodeBehavior, NodeScope};
use crate::node::{NodeCategory, NodeRegistry, NodeType, Param};
use crate::port::{Port, PortType};

/// Largest grid side `sig_grid_pos` builds
const MAX_GRID_SIDE: f64 = 50.0;

/// Register the signal node types
pub fn register_signal_nodes(registry: &mut NodeRegistry) {
    registry.register(
        NodeType::new("sig_mouse", "Mouse Pos", NodeCategory::Signal)
            .with_description("Pointer X/Y coordinates (-1 to 1)")
            .with_port(Port::output("X", PortType::Number))
            .with_port(Port::output("Y", PortType::Number))
            .with_behavior(Pointer),
    );

    registry.register(
        NodeType::new("sig_lfo", "LFO (Wave)", NodeCategory::Signal)
            .with_description("Periodic signal over time")
            .with_port(Port::input("Phase", PortType::Number))
            .with_port(Port::input("Amplitude", PortType::Number))
            .with_port(Port::input("Frequency", PortType::Number))
            .with_port(Port::output("Val", PortType::Number))
            .with_param("Type", Param::number(0.0).with_range(0.0, 3.0).with_step(1.0))
            .with_param("Frequency", Param::number(1.0).with_range(0.0, 10.0))
            .with_param("Amplitude", Param::number(1.0).with_range(0.0, 5.0))
            .with_param("Offset", Param::number(0.0))
            .with_behavior(Lfo),
    );

    registry.register(
        NodeType::new("sig_noise", "Noise (1D)", NodeCategory::Signal)
            .with_description("Smooth random value")
            .with_port(Port::input("Speed", PortType::Number))
            .with_port(Port::input("Scale", PortType::Number))
            .with_port(Port::output("Val", PortType::Number))
            .with_param("Speed", Param::number(1.0))
            .with_param("Scale", Param::number(1.0))
            .with_behavior(Noise),
    );

    registry.register(
        NodeType::new("sig_beat", "BPM Beat", NodeCategory::Signal)
            .with_description("Tempo-driven pulse and ramp")
            .with_port(Port::input("BPM", PortType::Number))
            .with_port(Port::output("Pulse", PortType::Number))
            .with_port(Port::output("Ramp", PortType::Number))
            .with_param("BPM", Param::number(120.0).with_range(40.0, 200.0).with_step(1.0))
            .with_behavior(Beat),
    );

    registry.register(
        NodeType::new("sig_grid_pos", "Grid Positions", NodeCategory::Signal)
            .with_description("Flat XYZ positions of a centered grid")
            .with_port(Port::output("Arr", PortType::Array))
            .with_param("Rows", Param::number(10.0).with_range(1.0, MAX_GRID_SIDE).with_step(1.0))
            .with_param("Cols", Param::number(10.0).with_range(1.0, MAX_GRID_SIDE).with_step(1.0))
            .with_param("Space", Param::number(1.0))
            .with_behavior(GridPositions),
    );
}

/// Publishes the host's pointer position
struct Pointer;

impl NodeBehavior for Pointer {
    fn logic(&self, scope: &mut NodeScope<'_>, frame: &FrameContext) -> Result<(), BehaviorError> {
        scope.set_output("X", f64::from(frame.pointer[0]));
        scope.set_output("Y", f64::from(frame.pointer[1]));
        Ok(())
    }
}

/// Waveform selected by the `Type` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    Triangle,
    Square,
    Saw,
}

impl Waveform {
    fn from_param(value: f64) -> Self {
        match value.round() as i64 {
            1 => Self::Triangle,
            2 => Self::Square,
            3 => Self::Saw,
            _ => Self::Sine,
        }
    }

    /// Sample at `t` cycles-ish time with a phase offset
    fn sample(self, t: f64, phase: f64) -> f64 {
        match self {
            Self::Sine => (t + phase).sin(),
            Self::Triangle => ((t % 2.0) - 1.0).abs() * 2.0 - 1.0,
            Self::Square => {
                let s = (t + phase).sin();
                if s == 0.0 {
                    0.0
                } else {
                    s.signum()
                }
            }
            Self::Saw => (t % 1.0) * 2.0 - 1.0,
        }
    }
}

struct Lfo;

impl NodeBehavior for Lfo {
    fn logic(&self, scope: &mut NodeScope<'_>, frame: &FrameContext) -> Result<(), BehaviorError> {
        let t = frame.time * scope.input_number("Frequency");
        let amplitude = scope.input_number("Amplitude");
        let phase = scope.input_number("Phase");
        let wave = Waveform::from_param(scope.param_number("Type"));

        let value = wave.sample(t, phase) * amplitude + scope.param_number("Offset");
        scope.set_output("Val", value);
        Ok(())
    }
}

/// Smoothed value noise in `0..1`
fn noise_1d(x: f64) -> f64 {
    let i = x.floor();
    let f = x - i;
    let w = f * f * (3.0 - 2.0 * f);
    let hash = |n: f64| {
        let h = (n * 12.9898).sin() * 43_758.545_3;
        h - h.floor()
    };
    let (a, b) = (hash(i), hash(i + 1.0));
    a + (b - a) * w
}

struct Noise;

impl NodeBehavior for Noise {
    fn logic(&self, scope: &mut NodeScope<'_>, frame: &FrameContext) -> Result<(), BehaviorError> {
        let speed = scope.input_number("Speed");
        let scale = scope.input_number("Scale");
        scope.set_output("Val", noise_1d(frame.time * speed) * scale);
        Ok(())
    }
}

struct Beat;

impl NodeBehavior for Beat {
    fn logic(&self, scope: &mut NodeScope<'_>, frame: &FrameContext) -> Result<(), BehaviorError> {
        let beats = frame.time * scope.input_number("BPM") / 60.0;
        let ramp = beats % 1.0;
        scope.set_output("Ramp", ramp);
        scope.set_output("Pulse", if ramp < 0.1 { 1.0 } else { 0.0 });
        Ok(())
    }
}

/// Last grid built, so unchanged params skip the rebuild
struct GridCache {
    rows: usize,
    cols: usize,
    space: f64,
}

struct GridPositions;

/// Param ranges are only hints, so clamp here
fn grid_side(value: f64) -> usize {
    if value.is_nan() {
        return 1;
    }
    value.clamp(1.0, MAX_GRID_SIDE).floor() as usize
}

impl NodeBehavior for GridPositions {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let rows = grid_side(scope.param_number("Rows"));
        let cols = grid_side(scope.param_number("Cols"));
        let space = scope.param_number("Space");

        let fresh = scope
            .state()
            .get::<GridCache>()
            .is_some_and(|c| c.rows == rows && c.cols == cols && c.space == space);
        if fresh && scope.output("Arr").is_some() {
            return Ok(());
        }

        let off_x = (cols - 1) as f64 * space * 0.5;
        let off_z = (rows - 1) as f64 * space * 0.5;
        let mut positions = Vec::with_capacity(rows * cols * 3);
        for z in 0..rows {
            for x in 0..cols {
                positions.extend([x as f64 * space - off_x, 0.0, z as f64 * space - off_z]);
            }
        }

        scope.set_output("Arr", positions);
        scope.state().set(GridCache { rows, cols, space });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::graph::Graph;
    use crate::library::create_standard_registry;
    use crate::node::{Node, NodeId, NodeState};
    use crate::session::Session;
    use std::sync::Arc;
    use crate::port::PortValue;
    use indexmap::IndexMap;

    fn run(type_id: &str, frame: &FrameContext, state: &mut NodeState) -> IndexMap<String, PortValue> {
        let mut registry = NodeRegistry::new();
        register_signal_nodes(&mut registry);
        let mut graph = Graph::new();
        let id = graph
            .insert_node(registry.create_node(type_id, NodeId(1)).unwrap())
            .unwrap();

        let mut values = IndexMap::new();
        let mut scope = NodeScope::new(&graph, id, &mut values, state);
        registry
            .behavior(type_id)
            .unwrap()
            .logic(&mut scope, frame)
            .unwrap();
        values
    }

    #[test]
    fn test_pointer() {
        let frame = FrameContext::at(0.0).with_pointer(0.5, -0.25);
        let values = run("sig_mouse", &frame, &mut NodeState::default());
        assert_eq!(values["X"], PortValue::Number(0.5));
        assert_eq!(values["Y"], PortValue::Number(-0.25));
    }

    #[test]
    fn test_lfo_sine() {
        let frame = FrameContext::at(std::f64::consts::FRAC_PI_2);
        let values = run("sig_lfo", &frame, &mut NodeState::default());
        assert!((values["Val"].as_number() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_waveforms() {
        assert_eq!(Waveform::from_param(2.0), Waveform::Square);
        assert_eq!(Waveform::from_param(7.0), Waveform::Sine);
        assert_eq!(Waveform::Saw.sample(0.25, 0.0), -0.5);
        assert_eq!(Waveform::Triangle.sample(1.0, 0.0), -1.0);
        assert_eq!(Waveform::Square.sample(1.0, 0.0), 1.0);
    }

    #[test]
    fn test_noise_range() {
        for step in 0..100 {
            let v = noise_1d(f64::from(step) * 0.37);
            assert!((0.0..1.0).contains(&v), "{v}");
        }
    }

    #[test]
    fn test_beat() {
        let values = run("sig_beat", &FrameContext::at(0.5), &mut NodeState::default());
        assert_eq!(values["Ramp"], PortValue::Number(0.0));
        assert_eq!(values["Pulse"], PortValue::Number(1.0));
    }

    #[test]
    fn test_grid_positions() {
        let mut state = NodeState::default();
        let values = run("sig_grid_pos", &FrameContext::default(), &mut state);
        let arr = values["Arr"].as_array().unwrap();
        assert_eq!(arr.len(), 300);
        assert_eq!(&arr[..3], &[-4.5, 0.0, -4.5]);
        assert!(state.get::<GridCache>().is_some());
    }

    #[test]
    fn test_grid_side_is_clamped() {
        let mut session = Session::new(Arc::new(create_standard_registry()), SessionConfig::default());
        let grid = session.add_node("sig_grid_pos", [0.0, 0.0]).unwrap();
        session.set_param(grid, "Rows", 1e10).unwrap();
        session.set_param(grid, "Cols", f64::NAN).unwrap();

        let report = session.tick(&FrameContext::default()).unwrap();
        assert!(report.faults.is_empty());
        let arr = session.graph().node(grid).unwrap().value("Arr").unwrap();
        assert_eq!(arr.as_array().map(|a| a.len()), Some(50 * 3));

        assert_eq!(grid_side(-4.0), 1);
        assert_eq!(grid_side(7.9), 7);
        assert_eq!(grid_side(f64::INFINITY), 50);
    }

    #[test]
    fn test_registered_types() {
        let mut registry = NodeRegistry::new();
        register_signal_nodes(&mut registry);
        assert_eq!(registry.types_in_category(NodeCategory::Signal).count(), 5);
        assert!(registry.types().all(|t| t.behavior.is_some()));
    }
}

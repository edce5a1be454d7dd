// SPDX-License-Identifier: MIT OR Apache-2.0
//! Math nodes. All of them read numeric inputs that fall back to the
//! parameter of the same name when unconnected.

use crate::evaluation::{BehaviorError, FrameContext, NodeBehavior, NodeScope};
use crate::node::{NodeCategory, NodeRegistry, NodeType, Param};
use crate::port::{Port, PortType};

/// Tolerance for the equality comparisons
const EPSILON: f64 = 0.001;

/// Register the math node types
pub fn register_math_nodes(registry: &mut NodeRegistry) {
    registry.register(
        NodeType::new("math_const", "Constant", NodeCategory::Math)
            .with_description("Outputs a fixed number")
            .with_port(Port::output("Out", PortType::Number))
            .with_param("Value", Param::number(1.0))
            .with_behavior(Constant),
    );

    registry.register(
        NodeType::new("math_map", "Map Range", NodeCategory::Math)
            .with_description("Remaps a value from one range to another")
            .with_port(Port::input("In", PortType::Number))
            .with_port(Port::output("Out", PortType::Number))
            .with_param("InMin", Param::number(0.0))
            .with_param("InMax", Param::number(1.0))
            .with_param("OutMin", Param::number(0.0))
            .with_param("OutMax", Param::number(1.0))
            .with_param("Clamp", Param::number(0.0).with_range(0.0, 1.0).with_step(1.0))
            .with_behavior(MapRange),
    );

    registry.register(
        NodeType::new("math_func", "Math Func", NodeCategory::Math)
            .with_description("Sin, cos, tan, abs, log, round")
            .with_port(Port::input("In", PortType::Number))
            .with_port(Port::output("Out", PortType::Number))
            .with_param("Func", Param::number(0.0).with_range(0.0, 5.0).with_step(1.0))
            .with_behavior(Func),
    );

    registry.register(
        NodeType::new("math_op", "Math Op", NodeCategory::Math)
            .with_description("Add, subtract, multiply, divide, modulo")
            .with_port(Port::input("A", PortType::Number))
            .with_port(Port::input("B", PortType::Number))
            .with_port(Port::output("Out", PortType::Number))
            .with_param("Op", Param::number(0.0).with_range(0.0, 4.0).with_step(1.0))
            .with_behavior(BinaryOp),
    );

    registry.register(
        NodeType::new("math_clamp", "Clamp", NodeCategory::Math)
            .with_description("Restricts a value between min and max")
            .with_port(Port::input("In", PortType::Number))
            .with_port(Port::input("Min", PortType::Number))
            .with_port(Port::input("Max", PortType::Number))
            .with_port(Port::output("Out", PortType::Number))
            .with_param("Min", Param::number(0.0))
            .with_param("Max", Param::number(1.0))
            .with_behavior(Clamp),
    );

    registry.register(
        NodeType::new("math_compare", "Compare", NodeCategory::Math)
            .with_description("1 when the comparison holds, else 0")
            .with_port(Port::input("A", PortType::Number))
            .with_port(Port::input("B", PortType::Number))
            .with_port(Port::output("Out", PortType::Number))
            .with_param("Op", Param::number(0.0).with_range(0.0, 3.0).with_step(1.0))
            .with_behavior(Compare),
    );
}

/// Selector params are stored as floats; round to the nearest index
fn selector(scope: &NodeScope<'_>, name: &str) -> i64 {
    scope.param_number(name).round() as i64
}

fn map_range(v: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    out_min + (out_max - out_min) * (v - in_min) / (in_max - in_min)
}

struct Constant;

impl NodeBehavior for Constant {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let value = scope.param_number("Value");
        scope.set_output("Out", value);
        Ok(())
    }
}

struct MapRange;

impl NodeBehavior for MapRange {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let out_min = scope.param_number("OutMin");
        let out_max = scope.param_number("OutMax");
        let mut out = map_range(
            scope.input_number("In"),
            scope.param_number("InMin"),
            scope.param_number("InMax"),
            out_min,
            out_max,
        );
        if scope.param_number("Clamp") > 0.5 {
            out = out.clamp(out_min.min(out_max), out_min.max(out_max));
        }
        scope.set_output("Out", out);
        Ok(())
    }
}

struct Func;

impl NodeBehavior for Func {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let v = scope.input_number("In");
        let out = match selector(scope, "Func") {
            1 => v.cos(),
            2 => v.tan(),
            3 => v.abs(),
            4 => (if v > 0.0 { v } else { 0.0001 }).ln(),
            5 => v.round(),
            _ => v.sin(),
        };
        scope.set_output("Out", out);
        Ok(())
    }
}

struct BinaryOp;

impl NodeBehavior for BinaryOp {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let a = scope.input_number("A");
        let b = scope.input_number("B");
        let out = match selector(scope, "Op") {
            1 => a - b,
            2 => a * b,
            3 if b == 0.0 => 0.0,
            3 => a / b,
            4 => a % b,
            _ => a + b,
        };
        scope.set_output("Out", out);
        Ok(())
    }
}

struct Clamp;

impl NodeBehavior for Clamp {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let v = scope.input_number("In");
        let min = scope.input_number("Min");
        let max = scope.input_number("Max");
        scope.set_output("Out", v.max(min).min(max));
        Ok(())
    }
}

struct Compare;

impl NodeBehavior for Compare {
    fn logic(&self, scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        let a = scope.input_number("A");
        let b = scope.input_number("B");
        let holds = match selector(scope, "Op") {
            1 => a < b,
            2 => (a - b).abs() < EPSILON,
            3 => (a - b).abs() > EPSILON,
            _ => a > b,
        };
        scope.set_output("Out", if holds { 1.0 } else { 0.0 });
        Ok(())
    }
}

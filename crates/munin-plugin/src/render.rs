//! Rendering of a plugin's `config` block.

use std::collections::HashSet;
use std::sync::Arc;

use crate::field::Field;
use crate::plugin::Plugin;

/// Line terminating every multi-line response.
pub const END_OF_BLOCK: &str = ".";

/// Renders the complete `config` response for `plugin`, terminator included.
///
/// Graph attributes come first. Fields that another field references as its
/// negative side are emitted before all others, keeping the relative order
/// within both groups, because the renderer requires a `.negative` target to
/// be declared before the field pointing at it.
#[must_use]
pub fn config_lines(plugin: &dyn Plugin) -> Vec<String> {
    let fields = plugin.fields();
    let mut lines = plugin.graph_attributes().attribute_lines();

    let negative_targets = negative_targets(fields);
    let (targets, others): (Vec<_>, Vec<_>) = fields
        .iter()
        .partition(|f| negative_targets.contains(f.name()));

    for field in targets.into_iter().chain(others) {
        field_lines(&**field, plugin, &negative_targets, &mut lines);
    }

    lines.push(END_OF_BLOCK.to_string());
    lines
}

/// Names of fields referenced as `.negative` by some other field.
fn negative_targets(fields: &[Arc<dyn Field>]) -> HashSet<&str> {
    fields
        .iter()
        .filter_map(|f| {
            f.attributes()
                .negative()
                .map(|target| target.as_str())
                .filter(|target| *target != f.name())
        })
        .collect()
}

fn field_lines(
    field: &dyn Field,
    plugin: &dyn Plugin,
    negative_targets: &HashSet<&str>,
    lines: &mut Vec<String>,
) {
    let attrs = field.attributes();
    let name = field.name();

    lines.push(format!("{name}.label {}", attrs.label()));

    if let Some(token) = attrs.graph_style().draw_token() {
        lines.push(format!("{name}.draw {token}"));
    }
    if let Some(range) = attrs.warning().to_protocol_string() {
        lines.push(format!("{name}.warning {range}"));
    }
    if let Some(range) = attrs.critical().to_protocol_string() {
        lines.push(format!("{name}.critical {range}"));
    }
    if let Some(target) = attrs
        .negative()
        .filter(|target| target.as_str() != name)
        .filter(|target| plugin.field(target.as_str()).is_some())
    {
        lines.push(format!("{name}.negative {target}"));
    }
    if negative_targets.contains(name) {
        lines.push(format!("{name}.graph no"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldAttributes, FnField};
    use crate::graph::{category, GraphAttributes};
    use crate::plugin::BasicPlugin;
    use crate::types::{FieldName, GraphStyle, ValueRange};

    fn attrs(name: &str, label: &str) -> FieldAttributes {
        FieldAttributes::new(FieldName::new(name).unwrap(), label).unwrap()
    }

    fn field(attributes: FieldAttributes) -> Arc<dyn Field> {
        Arc::new(FnField::new(attributes, || None))
    }

    fn plugin(graph: GraphAttributes, fields: Vec<Arc<dyn Field>>) -> BasicPlugin {
        BasicPlugin::new("test", graph, fields).unwrap()
    }

    #[test]
    fn full_block() {
        let p = plugin(
            GraphAttributes::new("Uptime of host")
                .with_category(category::SYSTEM)
                .with_vertical_label("Uptime [minutes]")
                .with_scale(false)
                .with_arguments("--base 1000 --lower-limit 0"),
            vec![field(attrs("uptime", "host").with_graph_style(GraphStyle::Area))],
        );

        assert_eq!(
            config_lines(&p),
            vec![
                "graph_title Uptime of host",
                "graph_category system",
                "graph_vlabel Uptime [minutes]",
                "graph_scale no",
                "graph_args --base 1000 --lower-limit 0",
                "uptime.label host",
                "uptime.draw AREA",
                ".",
            ]
        );
    }

    #[test]
    fn negative_target_comes_first() {
        let a = attrs("a", "received");
        let b = attrs("b", "sent").with_negative(FieldName::new("a").unwrap());
        let p = plugin(GraphAttributes::new("Traffic"), vec![field(b), field(a)]);

        assert_eq!(
            config_lines(&p),
            vec![
                "graph_title Traffic",
                "a.label received",
                "a.graph no",
                "b.label sent",
                "b.negative a",
                ".",
            ]
        );
    }

    #[test]
    fn partition_preserves_relative_order() {
        let n = |s: &str| FieldName::new(s).unwrap();
        let fields = vec![
            field(attrs("x", "x")),
            field(attrs("out1", "out1").with_negative(n("in1"))),
            field(attrs("in1", "in1")),
            field(attrs("y", "y")),
            field(attrs("out2", "out2").with_negative(n("in2"))),
            field(attrs("in2", "in2")),
        ];
        let p = plugin(GraphAttributes::default(), fields);

        let labels: Vec<String> = config_lines(&p)
            .into_iter()
            .filter(|l| l.contains(".label "))
            .collect();
        assert_eq!(
            labels,
            vec![
                "in1.label in1",
                "in2.label in2",
                "x.label x",
                "out1.label out1",
                "y.label y",
                "out2.label out2",
            ]
        );
    }

    #[test]
    fn missing_negative_target_is_not_emitted() {
        let b = attrs("b", "sent").with_negative(FieldName::new("ghost").unwrap());
        let p = plugin(GraphAttributes::default(), vec![field(b)]);

        assert_eq!(config_lines(&p), vec!["b.label sent", "."]);
    }

    #[test]
    fn ranges_render_by_present_bounds() {
        let fields = vec![
            field(attrs("lo", "lo").with_warning(ValueRange::at_least(0.0))),
            field(attrs("hi", "hi").with_warning(ValueRange::at_most(100.0))),
            field(
                attrs("both", "both")
                    .with_warning(ValueRange::between(0.0, 100.0))
                    .with_critical(ValueRange::between(-5.0, 120.5)),
            ),
            field(attrs("none", "none").with_warning(ValueRange::NONE)),
        ];
        let p = plugin(GraphAttributes::default(), fields);

        assert_eq!(
            config_lines(&p),
            vec![
                "lo.label lo",
                "lo.warning 0:",
                "hi.label hi",
                "hi.warning :100",
                "both.label both",
                "both.warning 0:100",
                "both.critical -5:120.5",
                "none.label none",
                ".",
            ]
        );
    }

    #[test]
    fn self_reference_is_dropped() {
        let a = attrs("a", "a").with_negative(FieldName::new("a").unwrap());
        let b = attrs("b", "b").with_negative(FieldName::new("a").unwrap());
        let p = plugin(GraphAttributes::default(), vec![field(a), field(b)]);

        assert_eq!(
            config_lines(&p),
            vec!["a.label a", "a.graph no", "b.label b", "b.negative a", "."]
        );

        let alone = attrs("c", "c").with_negative(FieldName::new("c").unwrap());
        let p = plugin(GraphAttributes::default(), vec![field(alone)]);
        assert_eq!(config_lines(&p), vec!["c.label c", "."]);
    }

    #[test]
    fn empty_plugin_is_just_terminator() {
        let p = plugin(GraphAttributes::default(), vec![]);
        assert_eq!(config_lines(&p), vec!["."]);
    }
}

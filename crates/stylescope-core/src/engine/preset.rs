//! Built-in presets.

use stylescope_config::{DynamicRuleConfig, UserConfig};

const PALETTE: &[(&str, &str)] = &[
    ("red", "#ef4444"),
    ("orange", "#f97316"),
    ("yellow", "#eab308"),
    ("green", "#22c55e"),
    ("blue", "#3b82f6"),
    ("indigo", "#6366f1"),
    ("purple", "#a855f7"),
    ("pink", "#ec4899"),
    ("gray", "#6b7280"),
    ("white", "#ffffff"),
    ("black", "#000000"),
];

const STATICS: &[(&str, &str)] = &[
    ("block", "display: block;"),
    ("inline", "display: inline;"),
    ("inline-block", "display: inline-block;"),
    ("flex", "display: flex;"),
    ("inline-flex", "display: inline-flex;"),
    ("grid", "display: grid;"),
    ("contents", "display: contents;"),
    ("hidden", "display: none;"),
    ("flex-row", "flex-direction: row;"),
    ("flex-col", "flex-direction: column;"),
    ("flex-wrap", "flex-wrap: wrap;"),
    ("items-start", "align-items: flex-start;"),
    ("items-center", "align-items: center;"),
    ("items-end", "align-items: flex-end;"),
    ("justify-start", "justify-content: flex-start;"),
    ("justify-center", "justify-content: center;"),
    ("justify-between", "justify-content: space-between;"),
    ("justify-end", "justify-content: flex-end;"),
    ("relative", "position: relative;"),
    ("absolute", "position: absolute;"),
    ("fixed", "position: fixed;"),
    ("sticky", "position: sticky;"),
    ("w-full", "width: 100%;"),
    ("h-full", "height: 100%;"),
    ("w-screen", "width: 100vw;"),
    ("h-screen", "height: 100vh;"),
    ("rounded", "border-radius: 0.25rem;"),
    ("rounded-none", "border-radius: 0;"),
    ("rounded-full", "border-radius: 9999px;"),
    ("border", "border-width: 1px;"),
    ("font-normal", "font-weight: 400;"),
    ("font-bold", "font-weight: 700;"),
    ("italic", "font-style: italic;"),
    ("underline", "text-decoration-line: underline;"),
    ("text-left", "text-align: left;"),
    ("text-center", "text-align: center;"),
    ("text-right", "text-align: right;"),
];

/// Spacing rules: prefix, properties.
const SPACING: &[(&str, &[&str])] = &[
    ("m", &["margin"]),
    ("mx", &["margin-left", "margin-right"]),
    ("my", &["margin-top", "margin-bottom"]),
    ("mt", &["margin-top"]),
    ("mr", &["margin-right"]),
    ("mb", &["margin-bottom"]),
    ("ml", &["margin-left"]),
    ("p", &["padding"]),
    ("px", &["padding-left", "padding-right"]),
    ("py", &["padding-top", "padding-bottom"]),
    ("pt", &["padding-top"]),
    ("pr", &["padding-right"]),
    ("pb", &["padding-bottom"]),
    ("pl", &["padding-left"]),
    ("gap", &["gap"]),
    ("w", &["width"]),
    ("h", &["height"]),
];

const BREAKPOINTS: &[(&str, &str)] = &[
    ("sm", "640px"),
    ("md", "768px"),
    ("lg", "1024px"),
    ("xl", "1280px"),
];

/// Configuration for a named preset, or `None` if the name is unknown.
pub fn preset(name: &str) -> Option<UserConfig> {
    match name {
        "core" => Some(core()),
        _ => None,
    }
}

fn core() -> UserConfig {
    let mut config = UserConfig::default();

    for (name, css) in STATICS {
        config.rules.insert(name.to_string(), css.to_string());
    }
    for (color, hex) in PALETTE {
        config
            .rules
            .insert(format!("text-{color}"), format!("color: {hex};"));
        config
            .rules
            .insert(format!("bg-{color}"), format!("background-color: {hex};"));
    }

    for (prefix, properties) in SPACING {
        let css = properties
            .iter()
            .map(|p| format!("{p}: calc($1 * 0.25rem);"))
            .collect::<Vec<_>>()
            .join(" ");
        config.dynamic_rules.push(DynamicRuleConfig {
            pattern: format!(r"^{prefix}-(\d+)$"),
            css,
            autocomplete: [1, 2, 4, 8]
                .iter()
                .map(|n| format!("{prefix}-{n}"))
                .collect(),
        });
    }
    config.dynamic_rules.push(DynamicRuleConfig {
        pattern: r"^opacity-(\d+)$".to_string(),
        css: "opacity: calc($1 / 100);".to_string(),
        autocomplete: vec!["opacity-50".to_string()],
    });
    config.dynamic_rules.push(DynamicRuleConfig {
        pattern: r"^z-(\d+)$".to_string(),
        css: "z-index: $1;".to_string(),
        autocomplete: vec!["z-10".to_string()],
    });

    for (name, width) in BREAKPOINTS {
        config
            .breakpoints
            .insert(name.to_string(), width.to_string());
    }

    config
}

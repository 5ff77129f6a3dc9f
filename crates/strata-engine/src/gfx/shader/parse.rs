//! Line-oriented reader for WGSL vertex inputs.
//!
//! Only what is needed to derive a vertex layout is understood: the `@vertex`
//! entry point's parameter list and, when the inputs are grouped, the struct
//! it names. Everything else in the module is skipped.

use super::layout::{LayoutError, VertexAttribute};
use super::types;

/// One parameter of the entry point, with the 1-based line it starts on.
struct Param {
    line: usize,
    text: String,
}

pub(crate) fn vertex_inputs(source: &str) -> Result<Vec<VertexAttribute>, LayoutError> {
    let lines: Vec<&str> = source.lines().map(strip_comment).collect();

    let params = entry_point_params(&lines)?;

    let mut attributes = Vec::new();
    let mut input_struct = None;
    for param in params {
        let text = param.text.trim();
        if text.starts_with("@location") {
            attributes.push(declaration(param.line, text)?);
        } else if text.starts_with("@builtin") || text.is_empty() {
            continue;
        } else if let Some((_, ty)) = text.split_once(':') {
            input_struct = Some(ty.trim().to_string());
        }
    }

    if let Some(name) = input_struct {
        attributes.extend(struct_fields(&lines, &name)?);
    }

    Ok(attributes)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Collects the parameters of the first function after `@vertex`.
fn entry_point_params(lines: &[&str]) -> Result<Vec<Param>, LayoutError> {
    let start = lines
        .iter()
        .position(|l| l.contains("@vertex"))
        .ok_or(LayoutError::MissingEntryPoint)?;

    let mut params = Vec::new();
    let mut current = String::new();
    let mut current_line = 0;
    let mut depth = 0i32;
    let mut angle = 0i32;
    let mut seen_fn = false;

    for (idx, line) in lines.iter().enumerate().skip(start) {
        let mut text: &str = line;
        if !seen_fn {
            // The signature may sit on the `@vertex` line or a later one.
            match text.find("fn ") {
                Some(i) => {
                    seen_fn = true;
                    text = &text[i..];
                }
                None => continue,
            }
        }

        for ch in text.chars() {
            match ch {
                '(' => {
                    depth += 1;
                    if depth == 1 {
                        current_line = idx + 1;
                        continue;
                    }
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        push_param(&mut params, &mut current, current_line);
                        return Ok(params);
                    }
                }
                '<' => angle += 1,
                '>' => angle -= 1,
                ',' if depth == 1 && angle == 0 => {
                    push_param(&mut params, &mut current, current_line);
                    current_line = idx + 1;
                    continue;
                }
                _ => {}
            }
            if depth >= 1 {
                if current.trim().is_empty() && !ch.is_whitespace() {
                    current_line = idx + 1;
                }
                current.push(ch);
            }
        }
        if depth >= 1 {
            current.push(' ');
        }
    }

    Err(LayoutError::MissingEntryPoint)
}

fn push_param(params: &mut Vec<Param>, current: &mut String, line: usize) {
    let text = std::mem::take(current);
    if !text.trim().is_empty() {
        params.push(Param { line, text });
    }
}

fn struct_fields(lines: &[&str], name: &str) -> Result<Vec<VertexAttribute>, LayoutError> {
    let start = lines
        .iter()
        .position(|l| {
            let mut tokens = l
                .split(|c: char| c.is_whitespace() || c == '{')
                .filter(|t| !t.is_empty());
            tokens.next() == Some("struct") && tokens.next() == Some(name)
        })
        .ok_or_else(|| LayoutError::UnknownStruct { name: name.to_string() })?;

    let mut fields = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(start + 1) {
        let text = line.trim();
        if text.starts_with('}') {
            break;
        }
        if text.starts_with("@location") {
            fields.push(declaration(idx + 1, text)?);
        }
    }
    Ok(fields)
}

/// Parses `@location(N) [@attr...] name: type[,]`.
fn declaration(line: usize, text: &str) -> Result<VertexAttribute, LayoutError> {
    let malformed = || LayoutError::Malformed { line, text: text.to_string() };

    let body = text.trim().trim_end_matches(',').trim_end();
    let rest = body.strip_prefix("@location").ok_or_else(malformed)?.trim_start();
    let rest = rest.strip_prefix('(').ok_or_else(malformed)?;
    let (number, rest) = rest.split_once(')').ok_or_else(malformed)?;
    let location: u32 = number.trim().parse().map_err(|_| malformed())?;

    let rest = skip_attributes(rest.trim_start()).ok_or_else(malformed)?;

    let (name, ty) = rest.split_once(':').ok_or_else(malformed)?;
    let name = name.trim();
    let ty = ty.trim();
    if !is_identifier(name) || ty.is_empty() {
        return Err(malformed());
    }

    let info = types::lookup(ty).ok_or_else(|| LayoutError::UnknownType {
        line,
        ty: ty.to_string(),
    })?;
    Ok(VertexAttribute::new(name, location, info))
}

/// Skips leading `@attr` / `@attr(args)` tokens.
fn skip_attributes(mut rest: &str) -> Option<&str> {
    while let Some(after) = rest.strip_prefix('@') {
        let end = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let mut tail = after[end..].trim_start();
        if let Some(args) = tail.strip_prefix('(') {
            let close = args.find(')')?;
            tail = &args[close + 1..];
        }
        rest = tail.trim_start();
    }
    Some(rest)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::ElementType;

    const STRUCT_INPUT: &str = r#"
struct VsIn {
    @location(1) color: vec4<f32>,
    // @location(9) ignored: f32,
    @location(0) position: vec3<f32>,
    @location(3) @interpolate(flat) slot: f32,
    @location(2) uv: vec2f,
};

@vertex
fn vs_main(input: VsIn, @builtin(vertex_index) idx: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(input.position, 1.0);
}
"#;

    #[test]
    fn reads_struct_fields() {
        let attrs = vertex_inputs(STRUCT_INPUT).unwrap();
        let names: Vec<(&str, u32)> = attrs.iter().map(|a| (a.name.as_str(), a.location)).collect();
        assert_eq!(names, vec![("color", 1), ("position", 0), ("slot", 3), ("uv", 2)]);
        assert_eq!(attrs[1].size(), 3);
    }

    #[test]
    fn reads_direct_parameters_across_lines() {
        let src = "@vertex\nfn vs(\n    @location(0) pos: vec2<f32>,\n    @location(1) id: vec2<u32>,\n    @builtin(instance_index) i: u32,\n) -> @builtin(position) vec4f { }";
        let attrs = vertex_inputs(src).unwrap();

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].element(), ElementType::Uint);
    }

    #[test]
    fn missing_entry_point() {
        let src = "fn helper() -> f32 { return 1.0; }";
        assert_eq!(vertex_inputs(src).unwrap_err(), LayoutError::MissingEntryPoint);
    }

    #[test]
    fn malformed_line_reports_position() {
        let src = "struct V {\n    @location(x) pos: vec2f,\n};\n@vertex fn vs(v: V) {}";
        let err = vertex_inputs(src).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Malformed { line: 2, text: "@location(x) pos: vec2f,".into() }
        );
    }

    #[test]
    fn missing_colon_is_malformed() {
        let err = declaration(4, "@location(0) pos vec2f").unwrap_err();
        assert!(matches!(err, LayoutError::Malformed { line: 4, .. }));
    }

    #[test]
    fn unknown_type_names_token() {
        let src = "struct V {\n    @location(0) pos: vec2<f64>,\n};\n@vertex fn vs(v: V) {}";
        let err = vertex_inputs(src).unwrap_err();
        assert_eq!(err, LayoutError::UnknownType { line: 2, ty: "vec2<f64>".into() });
    }

    #[test]
    fn unknown_struct() {
        let err = vertex_inputs("@vertex fn vs(v: Missing) {}").unwrap_err();
        assert_eq!(err, LayoutError::UnknownStruct { name: "Missing".into() });
    }
}

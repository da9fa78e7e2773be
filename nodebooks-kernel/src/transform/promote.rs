/*
 * nodebooks-kernel
 *
 * Copyright (C) 2024-2026 NodeBooks Contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This library is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Declaration promotion: top-level declarations become attachments on the
//! shared context so they persist across cell runs. A conservative string
//! rewriter; anything it cannot prove safe passes through untouched.

use crate::transform::scanner::{block_end, scan, skip_blank, statement_end, word_at, ScanMap};

pub fn promote(source: &str) -> String {
    let map = scan(source);
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(source.len() + 64);
    let mut pos = 0;
    let mut at_start = true;

    while pos < bytes.len() {
        if at_start && map.is_code[pos] && map.depth[pos] == 0 {
            if let Some((rewritten, resume)) = try_rewrite(&map, source, pos) {
                out.extend_from_slice(rewritten.as_bytes());
                pos = resume;
                at_start = true;
                continue;
            }
        }

        let byte = bytes[pos];

        if map.is_code[pos] {
            match byte {
                b';' if map.depth[pos] == 0 => at_start = true,
                b'}' if map.depth[pos] == 1 => at_start = true,
                b'\n' if map.depth[pos] == 0 => at_start = true,
                _ if byte.is_ascii_whitespace() => {}
                _ => at_start = false,
            }
        }

        out.push(byte);
        pos += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| source.to_owned())
}

fn try_rewrite(map: &ScanMap, source: &str, pos: usize) -> Option<(String, usize)> {
    let mut cursor = pos;

    /* Strip an optional `export [default]` prefix. */
    if word_at(source, cursor) == Some("export") {
        cursor = skip_blank(map, source, cursor + "export".len());

        if word_at(source, cursor) == Some("default") {
            cursor = skip_blank(map, source, cursor + "default".len());
        }
    }

    match word_at(source, cursor)? {
        kind @ ("const" | "let" | "var") => rewrite_decl(map, source, cursor + kind.len()),
        "function" => rewrite_function(map, source, cursor, cursor),
        "async" => {
            let after = skip_blank(map, source, cursor + "async".len());

            match word_at(source, after) {
                Some("function") => rewrite_function(map, source, cursor, after),
                _ => None,
            }
        }
        "class" => rewrite_class(map, source, cursor),
        _ => None,
    }
}

/* `const|let|var name [: Type] = expr [;]` becomes
 * `var name = (globalThis.name = expr);`, preserving value semantics. */
fn rewrite_decl(map: &ScanMap, source: &str, after_kind: usize) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let name_start = skip_blank(map, source, after_kind);
    let name = word_at(source, name_start)?;

    if !is_binding_name(name) {
        return None;
    }

    let mut cursor = skip_blank(map, source, name_start + name.len());
    let bound = statement_end(map, source, cursor);

    if bytes.get(cursor) == Some(&b':') {
        cursor = find_assign(map, source, cursor + 1, bound)?;
    }

    if bytes.get(cursor) != Some(&b'=') || matches!(bytes.get(cursor + 1), Some(b'=') | Some(b'>')) {
        return None;
    }

    let expr_start = skip_blank(map, source, cursor + 1);
    let expr_end = statement_end(map, source, expr_start);

    if expr_start >= expr_end {
        return None;
    }

    /* Comma declarator lists pass through. */
    for i in expr_start .. expr_end {
        if map.is_code[i] && map.depth[i] == 0 && bytes[i] == b',' {
            return None;
        }
    }

    let expr = source[expr_start .. expr_end].trim_end();
    let resume = match bytes.get(expr_end) {
        Some(b';') => expr_end + 1,
        _ => expr_end,
    };

    Some((format!("var {name} = (globalThis.{name} = {expr});"), resume))
}

fn rewrite_function(map: &ScanMap, source: &str, keyword_start: usize, function_kw: usize) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let mut cursor = function_kw + "function".len();

    cursor = skip_blank(map, source, cursor);

    if bytes.get(cursor) == Some(&b'*') {
        cursor = skip_blank(map, source, cursor + 1);
    }

    let name = word_at(source, cursor)?;
    let close = block_end(map, source, cursor, 0)?;

    Some((format!("globalThis.{name} = {};", &source[keyword_start ..= close]), close + 1))
}

fn rewrite_class(map: &ScanMap, source: &str, class_kw: usize) -> Option<(String, usize)> {
    let name_start = skip_blank(map, source, class_kw + "class".len());
    let name = word_at(source, name_start)?;

    if name == "extends" {
        return None;
    }

    let close = block_end(map, source, name_start, 0)?;

    Some((format!("globalThis.{name} = {};", &source[class_kw ..= close]), close + 1))
}

/* Locates the `=` initializer past a type annotation, bounded by the
 * statement end. Arrow and comparison operators do not qualify. */
fn find_assign(map: &ScanMap, source: &str, from: usize, bound: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut pos = from;

    while pos < bound {
        if !map.is_code[pos] {
            pos += 1;
            continue;
        }

        if bytes[pos] == b'=' && map.depth[pos] == 0 {
            let prev = bytes[.. pos].iter().rev().find(|b| !b.is_ascii_whitespace()).copied().unwrap_or(0);
            let next = bytes.get(pos + 1).copied().unwrap_or(0);

            if !matches!(next, b'=' | b'>') && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                return Some(pos);
            }
        }

        pos += 1;
    }

    None
}

fn is_binding_name(name: &str) -> bool {
    !matches!(name, "of" | "in" | "instanceof" | "new" | "typeof")
}

#[cfg(test)]
mod test {
    use crate::transform::promote::promote;

    #[test]
    fn const_becomes_global_attachment() {
        assert_eq!(promote("const x = [1,2,3];"), "var x = (globalThis.x = [1,2,3]);");
        assert_eq!(promote("let n = 1 + 2;"), "var n = (globalThis.n = 1 + 2);");
        assert_eq!(promote("var v = 'a;b';"), "var v = (globalThis.v = 'a;b');");
    }

    #[test]
    fn type_annotations_are_dropped() {
        assert_eq!(promote("const n: number = 5;"), "var n = (globalThis.n = 5);");
        assert_eq!(
            promote("const f: (a: number) => number = (a) => a;"),
            "var f = (globalThis.f = (a) => a);"
        );
    }

    #[test]
    fn multiline_initializers_are_kept_whole() {
        let src = "const xs = [\n  1,\n  2,\n];\nxs;";
        let out = promote(src);

        assert!(out.starts_with("var xs = (globalThis.xs = [\n  1,\n  2,\n]);"));
        assert!(out.ends_with("xs;"));
    }

    #[test]
    fn continuation_lines_extend_the_initializer() {
        let src = "const total = [1, 2]\n  .map((n) => n * 2)\n  .length;";
        let out = promote(src);

        assert!(out.contains("globalThis.total = [1, 2]\n  .map((n) => n * 2)\n  .length"));
    }

    #[test]
    fn functions_and_classes_promote() {
        assert_eq!(promote("function add(a, b) { return a + b; }"), "globalThis.add = function add(a, b) { return a + b; };");
        assert_eq!(
            promote("export default async function go() { return 1; }"),
            "globalThis.go = async function go() { return 1; };"
        );
        assert_eq!(promote("class Point { }"), "globalThis.Point = class Point { };");
    }

    #[test]
    fn non_top_level_declarations_pass_through() {
        let src = "function f() { const inner = 1; return inner; }";

        assert_eq!(promote(src), format!("globalThis.f = {src};"));
    }

    #[test]
    fn comma_lists_and_bare_declarations_pass_through() {
        assert_eq!(promote("let a = 1, b = 2;"), "let a = 1, b = 2;");
        assert_eq!(promote("let a;"), "let a;");
    }

    #[test]
    fn later_statements_still_promote() {
        let out = promote("console.log('hi');\nconst x = 1;\n");

        assert!(out.contains("globalThis.x = 1"));
    }

    #[test]
    fn strings_and_comments_do_not_confuse_the_rewriter() {
        let out = promote("// const fake = 1;\nconst real = 2;");

        assert!(out.contains("// const fake = 1;"));
        assert!(out.contains("var real = (globalThis.real = 2);"));

        let out = promote("const s = 'const x = 1';");

        assert_eq!(out, "var s = (globalThis.s = 'const x = 1');");
    }
}

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

//! Capture wrap: hoists top-level imports to the head of the program and
//! decides whether the value of the last expression statement feeds the
//! display pipeline. The evaluator runs the body as an asynchronous scope
//! with top-level await; capture selection is the delicate part.

use crate::transform::{
    scanner::{block_end, scan, skip_blank, statement_end, word_at, ScanMap},
    CaptureMode, Language, Transformed, RESULT_BINDING,
};

/* Statements starting with these words are never capture targets. */
const NON_CAPTURE_WORDS: &[&str] = &[
    "for", "while", "if", "do", "switch", "try", "return", "throw", "break", "continue", "function", "class", "interface",
    "type", "import", "export", "const", "let", "var",
];

struct Range {
    start: usize,
    end: usize,
    word: Option<String>,
}

pub fn wrap(source: &str, language: Language) -> Transformed {
    let map = scan(source);
    let (imports, body) = hoist_imports(&map, source);
    let body_map = scan(&body);
    let ranges = statement_ranges(&body_map, &body);
    let selected = ranges.iter().rev().find(|range| {
        if body[range.start .. range.end].trim().trim_matches(';').trim().is_empty() {
            return false;
        }

        match &range.word {
            Some(word) => !NON_CAPTURE_WORDS.contains(&word.as_str()) && !(word == "async" && is_async_function(&body, range.start)),
            None => true,
        }
    });
    let mut out = String::new();

    for import in &imports {
        out.push_str(import);
        out.push('\n');
    }

    let (body_text, capture) = match selected {
        /* With no capturable statement, the JS variant mirrors script
         * semantics and surfaces the program's completion value; TS stays
         * silent. */
        None => match language {
            Language::Js => (body.clone(), CaptureMode::Completion),
            Language::Ts => (body.clone(), CaptureMode::None),
        },
        Some(range) => {
            let text = body[range.start .. range.end].trim_end().trim_end_matches(';').trim_end().to_owned();

            match language {
                Language::Ts => match is_reference_path(&text) {
                    true => (replace_range(&body, range, &text), CaptureMode::Result),
                    false => (body.clone(), CaptureMode::None),
                },
                Language::Js => match is_generic_arrow_ambiguous(&text) {
                    /* Ambiguity falls back to evaluating the expression at
                     * the end of the body instead of mid-body capture. */
                    true => (format!("{body}\n{RESULT_BINDING} = ({text});"), CaptureMode::Result),
                    false => (replace_range(&body, range, &text), CaptureMode::Result),
                },
            }
        }
    };

    out.push_str(&body_text);
    Transformed { source: out, capture }
}

fn replace_range(body: &str, range: &Range, text: &str) -> String {
    let bytes = body.as_bytes();
    let end = match bytes.get(range.end) {
        Some(b';') => range.end + 1,
        _ => range.end,
    };

    format!("{}{RESULT_BINDING} = ({text});{}", &body[.. range.start], &body[end ..])
}

fn statement_ranges(map: &ScanMap, source: &str) -> Vec<Range> {
    let bytes = source.as_bytes();
    let mut ranges = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        pos = skip_blank(map, source, pos);

        if pos >= bytes.len() {
            break;
        }

        if map.depth[pos] != 0 {
            pos += 1;
            continue;
        }

        let word = word_at(source, pos).map(str::to_owned);
        let end = range_end(map, source, pos, word.as_deref());
        let resume = match bytes.get(end) {
            Some(b';') => end + 1,
            _ => end,
        };

        ranges.push(Range {
            start: pos,
            end: end.min(bytes.len()),
            word,
        });
        pos = resume.max(pos + 1);
    }

    ranges
}

/* Declaration statements end at their syntactic boundary; everything else
 * follows the shared statement-end rule. */
fn range_end(map: &ScanMap, source: &str, start: usize, word: Option<&str>) -> usize {
    let boundary = match word {
        Some("function") | Some("class") | Some("interface") => block_end(map, source, start, 0).map(|close| close + 1),
        Some("async") if is_async_function(source, start) => block_end(map, source, start, 0).map(|close| close + 1),
        Some("export") => {
            let after = skip_blank(map, source, start + "export".len());
            let after = match word_at(source, after) {
                Some("default") => skip_blank(map, source, after + "default".len()),
                _ => after,
            };

            return range_end(map, source, after, word_at(source, after));
        }
        _ => None,
    };

    boundary.unwrap_or_else(|| statement_end(map, source, start))
}

fn is_async_function(source: &str, start: usize) -> bool {
    let map = scan(source);
    let after = skip_blank(&map, source, start + "async".len());

    word_at(source, after) == Some("function")
}

/* Heuristic for TypeScript generic-arrow syntax leaking into JS capture:
 * prefer "do not capture mid-body" when the text opens with a type
 * parameter list. */
fn is_generic_arrow_ambiguous(text: &str) -> bool {
    text.trim_start().starts_with('<')
}

/* The TS variant only captures bare identifier references and dotted
 * paths; call results stay silent. */
fn is_reference_path(text: &str) -> bool {
    let text = text.trim();

    !text.is_empty()
        && text.split('.').all(|segment| {
            let segment = segment.trim();

            !segment.is_empty()
                && segment.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

fn hoist_imports(map: &ScanMap, source: &str) -> (Vec<String>, String) {
    let bytes = source.as_bytes();
    let mut imports = Vec::new();
    let mut body = String::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = skip_blank(map, source, pos);

        if start >= bytes.len() {
            body.push_str(&source[pos ..]);
            break;
        }

        let is_import = map.depth[start] == 0
            && word_at(source, start) == Some("import")
            && bytes.get(skip_blank(map, source, start + "import".len())) != Some(&b'(');

        if !is_import {
            let end = range_end(map, source, start, word_at(source, start));
            let end = match bytes.get(end) {
                Some(b';') => end + 1,
                _ => end,
            };

            body.push_str(&source[pos .. end.min(bytes.len())]);
            pos = end.max(pos + 1);
            continue;
        }

        let end = import_end(map, source, start);
        let end_with_semi = match bytes.get(end) {
            Some(b';') => end + 1,
            _ => end,
        };

        body.push_str(&source[pos .. start]);
        imports.push(source[start .. end].trim_end().trim_end_matches(';').to_owned() + ";");
        pos = end_with_semi;
    }

    (imports, body)
}

/* Imports may span lines: `from`-clauses and module-path strings continue
 * the statement across a newline. */
fn import_end(map: &ScanMap, source: &str, start: usize) -> usize {
    let bytes = source.as_bytes();
    let mut pos = start;

    while pos < bytes.len() {
        if !map.is_code[pos] {
            pos += 1;
            continue;
        }

        let byte = bytes[pos];

        if byte == b';' && map.depth[pos] == 0 {
            return pos;
        }

        if byte == b'\n' && map.depth[pos] == 0 {
            let next = skip_blank(map, source, pos + 1);

            if next >= bytes.len() {
                return pos;
            }

            let continues = matches!(bytes[next], b'{' | b',' | b'\'' | b'"' | b'*') || word_at(source, next) == Some("from");

            if !continues {
                return pos;
            }
        }

        pos += 1;
    }

    bytes.len()
}

#[cfg(test)]
mod test {
    use crate::transform::{capture::wrap, CaptureMode, Language, Transformed};

    fn js(source: &str) -> Transformed {
        wrap(source, Language::Js)
    }

    fn ts(source: &str) -> Transformed {
        wrap(source, Language::Ts)
    }

    #[test]
    fn js_captures_trailing_expression() {
        let out = js("var x = (globalThis.x = [1,2,3]);\nx;");

        assert_eq!(out.capture, CaptureMode::Result);
        assert!(out.source.ends_with("__nb_result__ = (x);"));
    }

    #[test]
    fn statements_without_candidates_use_completion_semantics() {
        assert_eq!(js("for (let i = 0; i < 3; i++) { work(i); }").capture, CaptureMode::Completion);
        assert_eq!(js("const a = 1;").capture, CaptureMode::Completion);
        assert_eq!(js("try { risky(); } catch (e) { e.message; }").capture, CaptureMode::Completion);
    }

    #[test]
    fn js_captures_call_results() {
        let out = js("const f = () => 1;\nf();");

        assert_eq!(out.capture, CaptureMode::Result);
        assert!(out.source.contains("__nb_result__ = (f());"));
    }

    #[test]
    fn ts_captures_only_reference_paths() {
        assert_eq!(ts("const a = {b: {c: 1}};\na.b.c;").capture, CaptureMode::Result);
        assert_eq!(ts("let x = 1;\nx;").capture, CaptureMode::Result);
        assert_eq!(ts("const add = (a, b) => a + b;\nadd(1, 2);").capture, CaptureMode::None);
        assert_eq!(ts("foo();").capture, CaptureMode::None);
    }

    #[test]
    fn imports_are_hoisted_to_the_head() {
        let out = js("const a = 1;\nimport { x } from 'pkg';\na;");

        assert!(out.source.starts_with("import { x } from 'pkg';\n"));
        assert_eq!(out.capture, CaptureMode::Result);
    }

    #[test]
    fn multiline_imports_hoist_whole() {
        let src = "import {\n  a,\n  b,\n} from 'pkg';\na;";
        let out = js(src);

        assert!(out.source.starts_with("import {\n  a,\n  b,\n} from 'pkg';"));
    }

    #[test]
    fn generic_arrow_ambiguity_appends_instead_of_replacing() {
        let out = js("work();\n<T>(v) => v;");

        assert_eq!(out.capture, CaptureMode::Result);
        assert!(out.source.contains("work();"));
        assert!(out.source.ends_with("__nb_result__ = (<T>(v) => v);"));
    }

    #[test]
    fn trailing_function_declarations_do_not_steal_capture() {
        let out = js("compute();\nfunction helper() { return 1; }");

        assert_eq!(out.capture, CaptureMode::Result);
        assert!(out.source.contains("__nb_result__ = (compute());"));
    }
}

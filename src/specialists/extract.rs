//! Parsing helpers for free-text model responses.
//!
//! Models are asked to answer in `Label: value` form or with fenced code
//! blocks. These helpers recover the structured parts and report anything
//! missing as `None` rather than guessing.

use std::collections::HashMap;

/// Labelled values recovered from a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    values: HashMap<String, String>,
}

impl Fields {
    /// Value for `label` (case-insensitive), if present
    pub fn get(&self, label: &str) -> Option<&str> {
        self.values.get(&label.to_lowercase()).map(String::as_str)
    }

    pub fn take(&mut self, label: &str) -> Option<String> {
        self.values.remove(&label.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Strip list numbering, bullets and bold markers from the start of a line
fn normalize_line(line: &str) -> &str {
    let mut s = line.trim_start();
    s = s.trim_start_matches(['-', '*', '#']).trim_start();
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = s[digits..].strip_prefix('.').or_else(|| s[digits..].strip_prefix(')')) {
            s = rest.trim_start();
        }
    }
    s.trim_start_matches('*')
}

/// If `line` opens with one of `labels`, return the label index and the
/// text after the colon
fn match_label(line: &str, labels: &[&str]) -> Option<(usize, String)> {
    let normalized = normalize_line(line);
    let lowered = normalized.to_ascii_lowercase();

    labels.iter().enumerate().find_map(|(i, label)| {
        let label = label.to_ascii_lowercase();
        let rest = lowered.strip_prefix(&label)?;
        let rest = rest.trim_start_matches('*');
        let after_colon = rest.strip_prefix(':')?;
        // Slice the original text so the value keeps its case
        let offset = normalized.len() - after_colon.len();
        let value = normalized[offset..].trim_start_matches('*').trim();
        Some((i, value.to_string()))
    })
}

/// Strip one pair of matching surrounding quotes
pub fn strip_quotes(value: &str) -> &str {
    let v = value.trim();
    for q in ['"', '\'', '`'] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return v[1..v.len() - 1].trim();
        }
    }
    v
}

fn finish_value(raw: &str) -> Option<String> {
    let unfenced = unwrap_fence(raw.trim());
    let value = strip_quotes(&unfenced);
    if value.is_empty() || value.trim_end_matches('.').eq_ignore_ascii_case("not found") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Recover `Label: value` pairs from `text`.
///
/// A value is the rest of the label line. When that is empty the value is
/// the following lines up to the next recognised label. Labels match
/// case-insensitively and tolerate list numbering and bold markers. Empty
/// values and "Not found" are reported as absent.
pub fn extract_fields(text: &str, labels: &[&str]) -> Fields {
    let lines: Vec<&str> = text.lines().collect();
    let mut fields = Fields::default();
    let mut i = 0;

    while i < lines.len() {
        let Some((idx, inline)) = match_label(lines[i], labels) else {
            i += 1;
            continue;
        };

        let key = labels[idx].to_lowercase();
        i += 1;

        let raw = if inline.is_empty() {
            let start = i;
            while i < lines.len() && match_label(lines[i], labels).is_none() {
                i += 1;
            }
            lines[start..i].join("\n")
        } else {
            inline
        };

        if fields.values.contains_key(&key) {
            continue;
        }
        if let Some(value) = finish_value(&raw) {
            fields.values.insert(key, value);
        }
    }

    fields
}

/// A fenced block found in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Info string after the opening fence, lowercased
    pub lang: String,
    pub content: String,
    /// Line range covered, fences included
    first_line: usize,
    last_line: usize,
}

/// Every complete fenced block in `text`
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(usize, String)> = None;
    let mut body: Vec<&str> = Vec::new();

    for (n, line) in text.lines().enumerate() {
        let fence = line.trim().strip_prefix("```");
        match (open.take(), fence) {
            (None, Some(info)) => {
                open = Some((n, info.trim().to_lowercase()));
                body.clear();
            }
            (Some((start, lang)), Some(_)) => {
                blocks.push(FencedBlock {
                    lang,
                    content: body.join("\n"),
                    first_line: start,
                    last_line: n,
                });
            }
            (Some(state), None) => {
                body.push(line);
                open = Some(state);
            }
            (None, None) => {}
        }
    }

    blocks
}

/// If `text` is a single fenced block, return its body; otherwise `text`
fn unwrap_fence(text: &str) -> String {
    let t = text.trim();
    if t.starts_with("```") && t.ends_with("```") {
        if let Some(block) = fenced_blocks(t).into_iter().next() {
            return block.content;
        }
    }
    t.to_string()
}

/// Reduce a response to bare code or a bare command line.
///
/// Fenced blocks win when present; otherwise the whole text is used.
pub fn clean_code_block(text: &str) -> String {
    let blocks = fenced_blocks(text);
    if blocks.is_empty() {
        return text
            .lines()
            .filter(|l| !l.trim().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
    }
    blocks
        .iter()
        .map(|b| b.content.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

const CODE_STARTS: [&str; 4] = ["def ", "class ", "import ", "from "];

/// Longest run of lines that looks like unfenced Python
fn heuristic_block(lines: &[&str]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;

    while i < lines.len() {
        if !CODE_STARTS.iter().any(|k| lines[i].starts_with(k)) {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        while i < lines.len() {
            let line = lines[i];
            let continues = line.trim().is_empty()
                || line.starts_with(' ')
                || line.starts_with('\t')
                || CODE_STARTS.iter().any(|k| line.starts_with(k));
            if !continues {
                break;
            }
            i += 1;
        }
        let mut end = i;
        while end > start && lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        if best.map_or(true, |(s, e)| end - start > e - s) {
            best = Some((start, end));
        }
    }

    best
}

/// Split a coding response into code and explanation.
///
/// Preference order: python-tagged fences, any fences, then an unfenced
/// def/class/import run. Within a tier the longest block wins. The
/// explanation is the response with the chosen block removed.
pub fn extract_code(response: &str) -> (String, String) {
    let lines: Vec<&str> = response.lines().collect();
    let blocks = fenced_blocks(response);

    // Ties go to the earlier block
    fn longest<'a>(candidates: Vec<&'a FencedBlock>) -> Option<&'a FencedBlock> {
        candidates
            .into_iter()
            .fold(None, |best: Option<&'a FencedBlock>, b| match best {
                Some(cur) if cur.content.len() >= b.content.len() => Some(cur),
                _ => Some(b),
            })
    }

    let python: Vec<&FencedBlock> = blocks
        .iter()
        .filter(|b| b.lang == "python" || b.lang == "py" || b.lang == "python3")
        .collect();
    let chosen = longest(python).or_else(|| longest(blocks.iter().collect()));

    let (code, range) = match chosen {
        Some(block) => (block.content.clone(), Some((block.first_line, block.last_line + 1))),
        None => match heuristic_block(&lines) {
            Some((s, e)) => (lines[s..e].join("\n"), Some((s, e))),
            None => (String::new(), None),
        },
    };

    let explanation = match range {
        Some((s, e)) => lines[..s]
            .iter()
            .chain(lines[e..].iter())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        None => response.trim().to_string(),
    };

    (code.trim_end().to_string(), explanation)
}

/// Case-insensitive keyword table lookup: the first entry with any
/// matching keyword wins.
pub fn first_match<T: Copy>(text: &str, table: &[(T, &[&str])]) -> Option<T> {
    let lowered = text.to_lowercase();
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(value, _)| *value)
}

/// First `max_chars` characters of `text`, with `...` appended when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

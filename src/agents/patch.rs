//! Heuristic patch generation.
//!
//! Each recognised finding kind maps to one line-level text transform.
//! Generation is a pure function of the finding and the snippet text; the
//! diff is proposed, never applied.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use similar::TextDiff;

use crate::models::{CodeSnippet, Finding, Patch, PatchKind, WorkflowState};

static SECRET_ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<lead>\s*(?:(?:const|let|var|static|final|private|public|mut)\s+)*)(?P<name>[A-Za-z_][\w.]*)(?P<op>\s*(?::\s*[\w&']+\s*)?(?::=|=|:)\s*)["'](?P<value>[^"']+)["'](?P<rest>.*)$"#,
    )
    .expect("static secret assignment regex")
});

static EQUALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<left>[A-Za-z_][\w.\[\]]*)\s*(?:===|==)\s*(?P<right>[A-Za-z_][\w.\[\]]*)")
        .expect("static equality regex")
});

static SQL_FSTRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<pre>.*?\.execute\s*\(\s*)f(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')(?P<post>\s*\).*)$"#)
        .expect("static f-string query regex")
});

static SQL_CONCAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<pre>.*?\.(?:execute|query|raw)\s*\(\s*)(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')\s*\+\s*(?P<expr>[A-Za-z_][\w.\[\]]*)(?P<post>\s*\).*)$"#,
    )
    .expect("static concatenated query regex")
});

static INTERPOLATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'?\{(?P<expr>[^}]+)\}'?").expect("static interpolation regex"));

static WEAK_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:md5|sha1)\b").expect("static weak hash regex"));

const SECRET_WORDS: [&str; 8] = [
    "pass", "secret", "token", "key", "hash", "digest", "signature", "credential",
];

/// Patches for every recognised finding of a run, in category then
/// generation order.
pub fn generate_patches(state: &WorkflowState) -> Vec<Patch> {
    state
        .all_findings()
        .filter_map(|finding| {
            let snippet = state.context.snippet(&finding.file)?;
            generate_patch(finding, snippet)
        })
        .collect()
}

/// Patch one finding, or `None` when its kind is not fixable or no line
/// of the snippet matches the transform.
pub fn generate_patch(finding: &Finding, snippet: &CodeSnippet) -> Option<Patch> {
    let kind = PatchKind::recognize(&finding.kind)?;
    let language = snippet.language();
    let lines: Vec<&str> = snippet.content.lines().collect();

    let reported = (finding.line as usize)
        .checked_sub(1)
        .and_then(|idx| Some((idx, transform(kind, lines.get(idx)?, language)?)));

    let (index, replacement, applicable) = match reported {
        Some((idx, new_line)) => (idx, new_line, true),
        None => {
            let (idx, new_line) = lines
                .iter()
                .enumerate()
                .find_map(|(idx, line)| Some((idx, transform(kind, line, language)?)))?;
            (idx, new_line, false)
        }
    };

    let mut patched: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    patched[index] = replacement;
    let mut new_content = patched.join("\n");
    if snippet.content.ends_with('\n') {
        new_content.push('\n');
    }

    Some(Patch {
        finding_id: finding.id.clone(),
        kind,
        file: snippet.path.clone(),
        line: index as u32 + 1,
        diff: unified_diff(&snippet.path, &snippet.content, &new_content),
        applicable,
    })
}

fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

/// Rewrite a single line, or `None` when the pattern is absent.
fn transform(kind: PatchKind, line: &str, language: &str) -> Option<String> {
    match kind {
        PatchKind::HardcodedSecret => externalize_secret(line, language),
        PatchKind::InsecureComparison => constant_time_compare(line, language),
        PatchKind::SqlInjection => parameterize_query(line, language),
        PatchKind::WeakHash => strengthen_hash(line),
    }
}

fn externalize_secret(line: &str, language: &str) -> Option<String> {
    let caps = SECRET_ASSIGN_RE.captures(line)?;
    let name = &caps["name"];
    let lower = name.to_lowercase();
    if !SECRET_WORDS.iter().any(|w| lower.contains(w)) {
        return None;
    }
    let var = env_var_name(name);
    let lookup = match language {
        "python" => format!("os.environ.get(\"{var}\")"),
        "javascript" | "typescript" => format!("process.env.{var}"),
        "rust" => format!("std::env::var(\"{var}\").unwrap_or_default()"),
        "go" => format!("os.Getenv(\"{var}\")"),
        "java" | "kotlin" => format!("System.getenv(\"{var}\")"),
        "ruby" => format!("ENV[\"{var}\"]"),
        "php" => format!("getenv('{var}')"),
        "csharp" => format!("Environment.GetEnvironmentVariable(\"{var}\")"),
        _ => format!("getenv(\"{var}\")"),
    };
    Some(format!(
        "{}{}{}{}{}",
        &caps["lead"], name, &caps["op"], lookup, &caps["rest"]
    ))
}

/// `admin_pass` and `config.apiKey` become `ADMIN_PASS` and `API_KEY`.
fn env_var_name(name: &str) -> String {
    let last = name.rsplit('.').next().unwrap_or(name);
    let mut out = String::new();
    let mut prev_lower = false;
    for c in last.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' });
    }
    out
}

fn constant_time_compare(line: &str, language: &str) -> Option<String> {
    let lower = line.to_lowercase();
    if !SECRET_WORDS.iter().any(|w| lower.contains(w)) {
        return None;
    }
    let caps = EQUALITY_RE.captures(line)?;
    let (left, right) = (&caps["left"], &caps["right"]);
    let call = match language {
        "python" => format!("hmac.compare_digest({left}, {right})"),
        "javascript" | "typescript" => {
            format!("crypto.timingSafeEqual(Buffer.from({left}), Buffer.from({right}))")
        }
        "go" => format!("subtle.ConstantTimeCompare([]byte({left}), []byte({right})) == 1"),
        "java" | "kotlin" => {
            format!("MessageDigest.isEqual({left}.getBytes(), {right}.getBytes())")
        }
        "ruby" => format!("Rack::Utils.secure_compare({left}, {right})"),
        "php" => format!("hash_equals({left}, {right})"),
        _ => format!("constant_time_eq({left}.as_bytes(), {right}.as_bytes())"),
    };
    let whole = caps.get(0)?;
    Some(format!("{}{}{}", &line[..whole.start()], call, &line[whole.end()..]))
}

fn parameterize_query(line: &str, language: &str) -> Option<String> {
    let placeholder = if language == "python" { "%s" } else { "?" };

    if let Some(caps) = SQL_FSTRING_RE.captures(line) {
        let (sql, quote) = quoted(&caps)?;
        let mut params = Vec::new();
        let query = INTERPOLATION_RE.replace_all(sql, |c: &Captures| {
            params.push(c["expr"].trim().to_string());
            placeholder.to_string()
        });
        if params.is_empty() {
            return None;
        }
        return Some(format!(
            "{}{quote}{query}{quote}, {}{}",
            &caps["pre"],
            params_literal(&params, language),
            &caps["post"]
        ));
    }

    let caps = SQL_CONCAT_RE.captures(line)?;
    let (sql, quote) = quoted(&caps)?;
    let sql = sql.trim_end_matches('\'');
    let params = vec![caps["expr"].to_string()];
    Some(format!(
        "{}{quote}{sql}{placeholder}{quote}, {}{}",
        &caps["pre"],
        params_literal(&params, language),
        &caps["post"]
    ))
}

/// The string literal captured as `dq` or `sq`, with its quote character.
fn quoted<'c>(caps: &'c Captures<'_>) -> Option<(&'c str, char)> {
    caps.name("dq")
        .map(|m| (m.as_str(), '"'))
        .or_else(|| caps.name("sq").map(|m| (m.as_str(), '\'')))
}

fn params_literal(params: &[String], language: &str) -> String {
    match (language, params.len()) {
        ("python", 1) => format!("({},)", params[0]),
        ("python", _) => format!("({})", params.join(", ")),
        _ => format!("[{}]", params.join(", ")),
    }
}

fn strengthen_hash(line: &str) -> Option<String> {
    if !WEAK_HASH_RE.is_match(line) {
        return None;
    }
    let replaced = WEAK_HASH_RE.replace_all(line, |c: &Captures| {
        let matched = &c[0];
        if matched.chars().all(|ch| !ch.is_ascii_lowercase()) {
            "SHA256"
        } else if matched.starts_with(|ch: char| ch.is_ascii_uppercase()) {
            "Sha256"
        } else {
            "sha256"
        }
    });
    Some(replaced.into_owned())
}

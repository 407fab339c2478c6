// ── Remote command builders ──────────────────────────────────────────────────
//
// Every remote operation is a plain shell command executed through the
// session. Paths are always quoted; file content travels as a delimited
// block so arbitrary payloads (quotes, dollars, backticks) survive intact.

use std::borrow::Cow;

pub(crate) fn quote(s: &str) -> String {
    shell_escape::escape(Cow::from(s)).into_owned()
}

pub(crate) fn read_file_cmd(remote_path: &str) -> String {
    format!("cat {}", quote(remote_path))
}

pub(crate) fn mkdir_cmd(remote_path: &str) -> String {
    format!("mkdir -p {}", quote(remote_path))
}

pub(crate) fn list_dir_cmd(remote_path: &str) -> String {
    format!("ls -1 {} 2>/dev/null", quote(remote_path))
}

pub(crate) fn exists_cmd(remote_path: &str) -> String {
    format!("test -e {}", quote(remote_path))
}

/// Files are removed with `rm -f`, directories with `rmdir` so a
/// non-empty directory fails rather than silently vanishing.
pub(crate) fn delete_cmd(remote_path: &str) -> String {
    let q = quote(remote_path);
    format!("if [ -d {q} ]; then rmdir {q}; else rm -f {q}; fi", q = q)
}

/// Glob relative to `root`. `globstar` enables `**`, `nullglob` keeps a
/// no-match expansion from echoing the literal pattern; the trailing
/// `true` keeps a directory match from flipping the exit status.
pub(crate) fn glob_cmd(root: &str, pattern: &str) -> String {
    let inner = format!(
        "cd {} && shopt -s globstar nullglob && for f in {}; do [ -f \"$f\" ] && echo \"$f\"; done; true",
        quote(root),
        pattern
    );
    format!("bash -c {}", quote(&inner))
}

/// Delimited-block write. The quoted sentinel suppresses every kind of
/// shell expansion in the payload. A heredoc always newline-terminates
/// the file, so payloads lacking a final newline gain one; empty content
/// truncates instead.
pub(crate) fn write_file_cmd(remote_path: &str, content: &str) -> String {
    if content.is_empty() {
        return format!(": > {}", quote(remote_path));
    }
    let delimiter = heredoc_delimiter(content);
    if content.ends_with('\n') {
        format!(
            "cat > {} << '{}'\n{}{}",
            quote(remote_path),
            delimiter,
            content,
            delimiter
        )
    } else {
        format!(
            "cat > {} << '{}'\n{}\n{}",
            quote(remote_path),
            delimiter,
            content,
            delimiter
        )
    }
}

/// Pick a sentinel that provably does not appear in `content`.
pub(crate) fn heredoc_delimiter(content: &str) -> String {
    if !content.contains("EOFCONTENT") {
        return "EOFCONTENT".to_string();
    }
    let hash = fnv1a(content);
    let mut counter: u32 = 0;
    loop {
        counter += 1;
        let candidate = format!("EOF_SYNC_{}_{:08X}", counter, hash.wrapping_add(counter));
        if !content.contains(&candidate) {
            return candidate;
        }
    }
}

fn fnv1a(s: &str) -> u32 {
    s.bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193))
}

//! Compiler argument filtering. User vectors are merged onto the operator
//! defaults; anything not explicitly allowed is dropped.

/// Flags whose following token is a path that must stay inside the job
/// directory.
const PAIRED_PATH_FLAGS: &[&str] = &["--preload-file", "--embed-file", "--source-map-base"];

/// Accepted as an exact token or as a prefix (covering the `=value` forms).
const ALLOWED_PREFIXES: &[&str] = &[
    "-O0",
    "-O1",
    "-O2",
    "-O3",
    "-Os",
    "-Oz",
    "-g",
    "-g4",
    "-sMODULARIZE=",
    "-sENVIRONMENT=",
    "-sINVOKE_RUN=",
    "-sEXPORTED_FUNCTIONS=",
    "-sEXPORTED_RUNTIME_METHODS=",
    "-sALLOW_MEMORY_GROWTH=",
    "--preload-file",
    "--embed-file",
    "--source-map-base",
];

/// Rejected as an exact token or with an `=` suffix. `-o` is blocked so the
/// output name appended by the executor cannot be overridden.
const BLOCKED: &[&str] = &["-o", "--shell-file", "-sFORCE_FILESYSTEM", "-sENVIRONMENT=node"];

/// Merge the operator defaults with a user argument vector. Defaults come
/// first, verbatim; accepted user tokens keep their relative order.
pub fn merge_and_filter(defaults: &[String], user: &[String]) -> Vec<String> {
    let mut result = defaults.to_vec();

    let mut i = 0;
    while i < user.len() {
        let arg = user[i].trim();
        i += 1;
        if arg.is_empty() {
            continue;
        }

        // File-pairing flags consume the next token as a path; unsafe paths
        // drop the whole pair.
        if PAIRED_PATH_FLAGS.contains(&arg) && i < user.len() {
            let path = user[i].trim();
            i += 1;
            if safe_arg_path(path) {
                result.push(arg.to_owned());
                result.push(path.to_owned());
            }
            continue;
        }

        if is_blocked(arg) {
            continue;
        }
        if is_allowed(arg) {
            result.push(arg.to_owned());
        }
    }
    result
}

fn is_blocked(arg: &str) -> bool {
    BLOCKED.iter().any(|blocked| match arg.strip_prefix(blocked) {
        Some(rest) => rest.is_empty() || rest.starts_with('='),
        None => false,
    })
}

fn is_allowed(arg: &str) -> bool {
    ALLOWED_PREFIXES.iter().any(|prefix| arg.starts_with(prefix))
}

/// Reject absolute paths and parent escapes.
fn safe_arg_path(path: &str) -> bool {
    !path.starts_with('/') && !path.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(user: &[&str]) -> Vec<String> {
        let user = user.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        merge_and_filter(&[], &user)
    }

    #[test]
    fn hostile_vector_is_reduced_to_safe_flags() {
        let out = filter(&[
            "-O2",
            "-o",
            "evil",
            "-sFORCE_FILESYSTEM=1",
            "-sEXPORTED_FUNCTIONS=[_main]",
            "--preload-file",
            "../etc/passwd",
        ]);
        assert_eq!(out, ["-O2", "-sEXPORTED_FUNCTIONS=[_main]"]);
    }

    #[test]
    fn defaults_always_come_first() {
        let defaults = vec!["-sINVOKE_RUN=0".to_string(), "-sMODULARIZE=1".to_string()];
        let user = vec!["-O3".to_string(), "junk".to_string()];
        let out = merge_and_filter(&defaults, &user);
        assert_eq!(out, ["-sINVOKE_RUN=0", "-sMODULARIZE=1", "-O3"]);
    }

    #[test]
    fn blocked_flags_are_dropped_in_both_forms() {
        assert!(filter(&["-o"]).is_empty());
        assert!(filter(&["-o=app.html"]).is_empty());
        assert!(filter(&["--shell-file"]).is_empty());
        assert!(filter(&["--shell-file=tpl.html"]).is_empty());
        assert!(filter(&["-sFORCE_FILESYSTEM"]).is_empty());
        assert!(filter(&["-sENVIRONMENT=node"]).is_empty());
    }

    #[test]
    fn environment_web_is_allowed_while_node_is_not() {
        assert_eq!(filter(&["-sENVIRONMENT=web"]), ["-sENVIRONMENT=web"]);
        assert!(filter(&["-sENVIRONMENT=node"]).is_empty());
    }

    #[test]
    fn unknown_tokens_are_silently_dropped() {
        assert!(filter(&["--closure", "1", "-flto", "whatever"]).is_empty());
    }

    #[test]
    fn whitespace_is_trimmed_and_empty_tokens_dropped() {
        assert_eq!(filter(&["  -O1  ", "", "   "]), ["-O1"]);
    }

    #[test]
    fn safe_pair_is_kept_intact() {
        assert_eq!(
            filter(&["--preload-file", "assets/data.bin"]),
            ["--preload-file", "assets/data.bin"]
        );
        assert_eq!(
            filter(&["--embed-file", "notes.txt", "-O2"]),
            ["--embed-file", "notes.txt", "-O2"]
        );
    }

    #[test]
    fn unsafe_pair_drops_both_tokens() {
        assert!(filter(&["--preload-file", "/etc/passwd"]).is_empty());
        assert!(filter(&["--embed-file", "a/../../etc/passwd"]).is_empty());
        assert!(filter(&["--source-map-base", "/maps"]).is_empty());
    }

    #[test]
    fn trailing_pair_flag_passes_the_allow_rule() {
        // A pair flag with no companion token falls through to the allowlist.
        assert_eq!(filter(&["--preload-file"]), ["--preload-file"]);
    }

    #[test]
    fn debug_flag_matches_as_prefix() {
        assert_eq!(filter(&["-g"]), ["-g"]);
        assert_eq!(filter(&["-g4"]), ["-g4"]);
        assert_eq!(filter(&["-gsource-map"]), ["-gsource-map"]);
    }

    #[test]
    fn path_safety_rules() {
        assert!(safe_arg_path("assets/data.bin"));
        assert!(safe_arg_path("file.txt"));
        assert!(!safe_arg_path("/etc/passwd"));
        assert!(!safe_arg_path("../secret"));
        assert!(!safe_arg_path("a/b/../c"));
    }
}

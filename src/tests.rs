#[cfg(test)]
mod cmpact_tests {
    use crate::action::{ActionFile, ActionItem, ActionType, SideSnapshot};
    use crate::compare::{ComparisonEngine, classify, sort_results};
    use crate::config::{CliOverrides, ComparisonOptions, FileConfig, merge};
    use crate::error::ActionFileError;
    use crate::execute::{DRY_RUN_PREFIX, ExecuteOptions, execute};
    use crate::filter::Filter;
    use crate::fingerprint::{hash_file, try_fingerprint};
    use crate::generate::{GenerateOptions, generate};
    use crate::gitignore::translate;
    use crate::models::{
        CompareMethod, CompareSummary, ComparisonResult, FileInfo, Fingerprint, FingerprintMethod,
        HashAlgo, Status,
    };
    use crate::parser::parse;
    use crate::validate::validate;
    use crate::walk::collect;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn two_roots() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let left = dir.path().join("left");
        let right = dir.path().join("right");
        fs::create_dir(&left).unwrap();
        fs::create_dir(&right).unwrap();
        (dir, left, right)
    }

    fn run_compare(
        left: &Path,
        right: &Path,
        options: ComparisonOptions,
    ) -> (Vec<ComparisonResult>, CompareSummary) {
        let engine = ComparisonEngine::new(options).unwrap();
        let (mut results, summary) = engine.compare(left, right).unwrap();
        sort_results(&mut results);
        (results, summary)
    }

    fn by_path(results: &[ComparisonResult]) -> HashMap<String, ComparisonResult> {
        results.iter().map(|r| (r.path.clone(), r.clone())).collect()
    }

    fn action_doc(left: &Path, right: &Path) -> String {
        let (results, summary) = run_compare(left, right, ComparisonOptions::default());
        generate(&results, left, right, &summary, GenerateOptions::default())
    }

    fn file_info(size: u64, id: &str, method: FingerprintMethod) -> FileInfo {
        FileInfo {
            rel_path: "f".to_string(),
            size,
            modified: None,
            is_dir: false,
            fingerprint: Fingerprint {
                id: id.to_string(),
                method,
            },
            permissions: "rw-r--r--".to_string(),
        }
    }

    fn dir_info() -> FileInfo {
        FileInfo {
            rel_path: "d".to_string(),
            size: 0,
            modified: None,
            is_dir: true,
            fingerprint: Fingerprint::none(),
            permissions: "rwxr-xr-x".to_string(),
        }
    }

    // Filter

    #[test]
    fn test_filter_names_paths_extensions() {
        let filter = Filter::new(
            &["node_modules".to_string(), "*.tmp".to_string()],
            &["build/out".to_string(), "/docs/".to_string()],
            &[".LOG".to_string()],
        );

        assert!(filter.should_exclude("node_modules", true));
        assert!(filter.should_exclude("a/b/node_modules", true));
        assert!(filter.should_exclude("x/cache.tmp", false));
        assert!(!filter.should_exclude("x/cache.tmpl", false));

        assert!(filter.should_exclude("build/out", true));
        assert!(filter.should_exclude("build/out/app.bin", false));
        assert!(filter.should_exclude("nested/build/out", true));
        assert!(!filter.should_exclude("build/output", true));
        assert!(filter.should_exclude("docs", true));

        assert!(filter.should_exclude("server.log", false));
        assert!(filter.should_exclude("a/Server.Log", false));
        assert!(!filter.should_exclude("archive.log", true));
        assert!(!filter.should_exclude("readme.md", false));
    }

    #[test]
    fn test_filter_malformed_glob_matches_literally() {
        let filter = Filter::new(&["[abc".to_string()], &[], &[]);
        assert!(filter.should_exclude("x/[abc", false));
        assert!(!filter.should_exclude("x/a", false));
    }

    #[test]
    fn test_filter_windows_separators_normalized() {
        let filter = Filter::new(&[], &["build\\out".to_string()], &[]);
        assert!(filter.should_exclude("build/out/file", false));
        assert!(filter.should_exclude("build\\out\\file", false));
    }

    // Fingerprinter

    #[test]
    fn test_hash_empty_file_known_digests() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::File::create(&path).unwrap();

        assert_eq!(
            hash_file(&path, HashAlgo::Sha256).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_file(&path, HashAlgo::Blake3).unwrap(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_fingerprint_content_and_surrogate() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a", "0123456789");
        write(dir.path(), "b", "0123456789");
        write(dir.path(), "c", "abcdefghij");

        let a = try_fingerprint(&dir.path().join("a"), 0, HashAlgo::Sha256).unwrap();
        let b = try_fingerprint(&dir.path().join("b"), 0, HashAlgo::Sha256).unwrap();
        let c = try_fingerprint(&dir.path().join("c"), 0, HashAlgo::Sha256).unwrap();
        assert_eq!(a.method, FingerprintMethod::ContentHash);
        assert_eq!(a.id.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, c);

        // At the limit still hashes; above it uses size+mtime.
        let at_limit = try_fingerprint(&dir.path().join("a"), 10, HashAlgo::Sha256).unwrap();
        assert_eq!(at_limit.method, FingerprintMethod::ContentHash);
        let over = try_fingerprint(&dir.path().join("a"), 5, HashAlgo::Sha256).unwrap();
        assert_eq!(over.method, FingerprintMethod::SizeSurrogate);
        assert!(over.id.starts_with("size:10:mtime:"));
    }

    #[test]
    fn test_fingerprint_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(try_fingerprint(&dir.path().join("nope"), 0, HashAlgo::Sha256).is_err());
    }

    // Tree collector

    #[test]
    fn test_collect_prunes_excluded_directories() {
        let dir = tempdir().unwrap();
        write(dir.path(), "keep.txt", "k");
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "target/debug/app", "bin");
        write(dir.path(), "notes.bak", "old");

        let options = ComparisonOptions {
            exclude_names: vec!["target".to_string()],
            exclude_extensions: vec!["bak".to_string()],
            ..Default::default()
        };
        let filter = Arc::new(Filter::from_options(&options));
        let tree = collect(dir.path(), &options, filter);

        let mut keys: Vec<&str> = tree.entries.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["keep.txt", "src", "src/main.rs"]);
        assert!(tree.errors.is_empty());
        assert!(tree.entries["src"].is_dir);
        assert_eq!(tree.entries["src"].fingerprint.method, FingerprintMethod::None);
        assert_eq!(
            tree.entries["keep.txt"].fingerprint.method,
            FingerprintMethod::ContentHash
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_symlinks_opt_in() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        write(&root, "real/file.txt", "x");
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let options = ComparisonOptions::default();
        let tree = collect(&root, &options, Arc::new(Filter::default()));
        assert!(tree.entries.contains_key("real/file.txt"));
        assert!(!tree.entries.contains_key("link"));
        assert!(!tree.entries.contains_key("link/file.txt"));

        let follow = ComparisonOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let tree = collect(&root, &follow, Arc::new(Filter::default()));
        assert!(tree.entries.contains_key("link/file.txt"));
    }

    // Classification

    #[test]
    fn test_classify_rules() {
        let hashed = |size, id| file_info(size, id, FingerprintMethod::ContentHash);

        let r = classify("f", Some(&hashed(3, "aaa")), None);
        assert_eq!((r.status, r.method), (Status::OnlyLeft, CompareMethod::Existence));
        assert!(r.right.is_none());

        let r = classify("f", None, Some(&hashed(3, "aaa")));
        assert_eq!((r.status, r.method), (Status::OnlyRight, CompareMethod::Existence));
        assert!(r.left.is_none());

        let r = classify("d", Some(&dir_info()), Some(&dir_info()));
        assert_eq!((r.status, r.method), (Status::Identical, CompareMethod::Directory));

        let r = classify("d", Some(&dir_info()), Some(&hashed(3, "aaa")));
        assert_eq!((r.status, r.method), (Status::Modified, CompareMethod::TypeMismatch));

        // Size mismatch decides even when the fingerprints agree.
        let r = classify("f", Some(&hashed(3, "aaa")), Some(&hashed(4, "aaa")));
        assert_eq!((r.status, r.method), (Status::Modified, CompareMethod::Size));

        let r = classify("f", Some(&hashed(3, "aaa")), Some(&hashed(3, "aaa")));
        assert_eq!((r.status, r.method), (Status::Identical, CompareMethod::Hash));

        let r = classify("f", Some(&hashed(3, "aaa")), Some(&hashed(3, "bbb")));
        assert_eq!((r.status, r.method), (Status::Modified, CompareMethod::Hash));
    }

    #[test]
    fn test_classify_errors_never_identical() {
        let broken = file_info(3, Fingerprint::ERROR_ID, FingerprintMethod::Error);
        let r = classify("f", Some(&broken), Some(&broken.clone()));
        assert_eq!((r.status, r.method), (Status::Modified, CompareMethod::Error));
        assert!(r.left.is_some() && r.right.is_some());
    }

    // Comparison engine

    #[test]
    fn test_compare_completeness() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "same");
        write(&right, "a.txt", "same");
        write(&left, "b/c.txt", "left");
        write(&right, "b/c.txt", "right!");
        write(&left, "d.txt", "only left");
        write(&right, "e.txt", "only right");

        let (results, summary) = run_compare(&left, &right, ComparisonOptions::default());
        let map = by_path(&results);

        assert_eq!(results.len(), 5);
        assert_eq!(map.len(), results.len());
        assert_eq!(
            summary.identical + summary.modified + summary.only_left + summary.only_right,
            summary.total
        );
        assert_eq!(summary.total, 5);

        assert_eq!(map["a.txt"].status, Status::Identical);
        assert_eq!(map["b"].status, Status::Identical);
        assert_eq!(map["b/c.txt"].status, Status::Modified);
        assert_eq!(map["b/c.txt"].method, CompareMethod::Size);
        assert_eq!(map["d.txt"].status, Status::OnlyLeft);
        assert_eq!(map["e.txt"].status, Status::OnlyRight);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_compare_respects_filter_on_both_sides() {
        let (_dir, left, right) = two_roots();
        write(&left, ".git/HEAD", "ref: main");
        write(&right, "x.o", "obj");
        write(&left, "kept.txt", "k");

        let options = ComparisonOptions {
            exclude_names: vec![".git".to_string()],
            exclude_extensions: vec!["o".to_string()],
            ..Default::default()
        };
        let (results, summary) = run_compare(&left, &right, options);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "kept.txt");
        assert_eq!(summary.only_left, 1);
    }

    #[test]
    fn test_compare_bounded_workers() {
        let options = ComparisonOptions {
            parallel_workers: 2,
            ..Default::default()
        };
        let engine = ComparisonEngine::new(options).unwrap();
        assert_eq!(engine.workers(), 2);
    }

    #[test]
    fn test_compare_rejects_missing_root() {
        let (_dir, left, _right) = two_roots();
        let engine = ComparisonEngine::new(ComparisonOptions::default()).unwrap();
        assert!(engine.compare(&left, &left.join("missing")).is_err());
    }

    // Generator and parser

    #[test]
    fn test_generated_file_is_all_ignore() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "X");
        write(&right, "a.txt", "Y");
        write(&left, "l/only.txt", "l");
        write(&right, "r.txt", "r");
        write(&left, "same.txt", "s");
        write(&right, "same.txt", "s");

        let doc = action_doc(&left, &right);
        let file = parse(&doc).unwrap();

        let paths: Vec<&str> = file.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "l", "l/only.txt", "r.txt"]);
        assert!(file.items.iter().all(|i| i.action == ActionType::Ignore));
        assert_eq!(file.pending().count(), 0);

        assert_eq!(file.header.left_root, Some(left.display().to_string()));
        assert_eq!(file.header.right_root, Some(right.display().to_string()));
        assert_eq!(file.header.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
        assert!(file.header.generated.is_some());
        assert!(file.comments.iter().any(|c| c.contains("[x-]")));
    }

    #[test]
    fn test_generate_include_identical_and_hints() {
        let (_dir, left, right) = two_roots();
        write(&left, "same.txt", "s");
        write(&right, "same.txt", "s");

        let (results, summary) = run_compare(&left, &right, ComparisonOptions::default());
        let without = generate(&results, &left, &right, &summary, GenerateOptions::default());
        assert!(parse(&without).unwrap().items.is_empty());
        assert!(without.contains("# No differences found."));

        let with = generate(
            &results,
            &left,
            &right,
            &summary,
            GenerateOptions {
                include_identical: true,
                permission_hints: true,
            },
        );
        let file = parse(&with).unwrap();
        assert_eq!(file.items.len(), 1);
        let item = &file.items[0];
        assert_eq!(item.status, Status::Identical);
        assert_eq!(item.left.as_ref().and_then(|s| s.size), Some(1));
        assert_eq!(item.left, item.right);
    }

    #[test]
    fn test_parse_accumulates_errors_with_line_numbers() {
        let doc = "\
# header
[i] : MODIFIED : ok.txt
[z] : MODIFIED : bad-token.txt
> : MODIFIED : no-brackets.txt

[>] : CHANGED : bad-status.txt
[<] : ONLY_IN_RIGHT
[x-] : ONLY_IN_LEFT : fine/too.txt   # L: 3 B
";
        let err = parse(doc).unwrap_err();
        let ActionFileError::Parse(errors) = err else {
            panic!("expected parse errors");
        };
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 6, 7]);
        assert!(errors[0].message.contains("unknown action token 'z'"));
        assert!(errors[2].message.contains("unknown status"));
    }

    #[test]
    fn test_parse_tokens_and_paths() {
        let doc = "\
[ > ] : MODIFIED : dir/with: colon.txt
[<] : ONLY_IN_RIGHT : r.txt
[x-] : ONLY_IN_LEFT : l.txt
[-x] : ONLY_IN_RIGHT : r2.txt
[xx] : MODIFIED : both.txt
[p] : MODIFIED : patch.txt
";
        let file = parse(doc).unwrap();
        let actions: Vec<ActionType> = file.items.iter().map(|i| i.action).collect();
        assert_eq!(
            actions,
            vec![
                ActionType::CopyToRight,
                ActionType::CopyToLeft,
                ActionType::DeleteLeft,
                ActionType::DeleteRight,
                ActionType::DeleteBoth,
                ActionType::Patch,
            ]
        );
        assert_eq!(file.items[0].path, "dir/with: colon.txt");
        assert_eq!(file.items[0].line, 1);
        assert_eq!(file.items[5].line, 6);
    }

    #[test]
    fn test_hash_characters_in_names_round_trip() {
        let (_dir, left, right) = two_roots();
        write(&left, "#scratch#", "abc");
        write(&left, "notes #1.txt", "one");

        let doc = action_doc(&left, &right);
        let file = parse(&doc).unwrap();
        let paths: Vec<&str> = file.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["#scratch#", "notes #1.txt"]);
        assert!(file.items.iter().all(|i| i.action == ActionType::Ignore));
        assert_eq!(file.items[0].left.as_ref().and_then(|s| s.size), Some(3));

        let doc = doc.replace(
            "[i] : ONLY_IN_LEFT : notes #1.txt",
            "[>] : ONLY_IN_LEFT : notes #1.txt",
        );
        let file = parse(&doc).unwrap();
        validate(&file, &left, &right).unwrap();
        let (summary, _) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert_eq!(summary.failed, 0);
        assert_eq!(fs::read_to_string(right.join("notes #1.txt")).unwrap(), "one");
        assert!(!right.join("notes").exists());
        assert!(!right.join("#scratch#").exists());
    }

    #[test]
    fn test_path_keeps_spaces_and_non_hint_comments() {
        let doc = "\
[>] : ONLY_IN_LEFT : a.txt    # L: 1 B
[>] : ONLY_IN_LEFT :  lead.txt
[>] : MODIFIED : odd   # not a hint
";
        let file = parse(doc).unwrap();
        assert_eq!(file.items[0].path, "a.txt ");
        assert_eq!(file.items[0].left.as_ref().and_then(|s| s.size), Some(1));
        assert_eq!(file.items[1].path, " lead.txt");
        assert_eq!(file.items[2].path, "odd   # not a hint");
        assert!(file.items[2].left.is_none());
    }

    #[test]
    fn test_side_snapshot_hints() {
        let snap = SideSnapshot::parse_hint(" 12 B 0123456789ab").unwrap();
        assert_eq!(snap.size, Some(12));
        assert_eq!(snap.hash_prefix.as_deref(), Some("0123456789ab"));
        assert_eq!(snap.hint(), "12 B 0123456789ab");
        assert!(SideSnapshot::parse_hint("dir").unwrap().is_dir);
        assert!(SideSnapshot::parse_hint("twelve").is_none());
    }

    // Validator

    #[test]
    fn test_validate_missing_source_after_generation() {
        let (_dir, left, right) = two_roots();
        write(&left, "gone.txt", "soon deleted");

        let doc = action_doc(&left, &right)
            .replace("[i] : ONLY_IN_LEFT : gone.txt", "[>] : ONLY_IN_LEFT : gone.txt");
        let expected_line = doc
            .lines()
            .position(|l| l.starts_with("[>] : ONLY_IN_LEFT : gone.txt"))
            .unwrap()
            + 1;
        let file = parse(&doc).unwrap();

        fs::remove_file(left.join("gone.txt")).unwrap();

        let err = validate(&file, &left, &right).unwrap_err();
        let ActionFileError::Validation(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, expected_line);
        assert_eq!(errors[0].path, "gone.txt");
        assert!(errors[0].to_string().contains("gone.txt"));
        assert!(!right.join("gone.txt").exists());
    }

    #[test]
    fn test_validate_rejects_duplicates_unsafe_paths_and_patch() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "a");
        write(&left, "b.txt", "b");

        let doc = "\
[>] : ONLY_IN_LEFT : a.txt
[i] : ONLY_IN_LEFT : ./a.txt
[>] : ONLY_IN_LEFT : ../escape.txt
[x-] : ONLY_IN_LEFT : /etc/passwd
[p] : MODIFIED : b.txt
[-x] : ONLY_IN_RIGHT : not-there.txt
[xx] : MODIFIED : b.txt
";
        let file = parse(doc).unwrap();
        let ActionFileError::Validation(errors) = validate(&file, &left, &right).unwrap_err()
        else {
            panic!("expected validation errors");
        };
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5, 6, 7]);
        assert!(errors[0].message.contains("duplicate"));
        assert!(errors[3].message.contains("reserved"));
    }

    #[test]
    fn test_validate_delete_both_needs_one_side() {
        let (_dir, left, right) = two_roots();
        write(&right, "r.txt", "r");
        let doc = "[xx] : ONLY_IN_RIGHT : r.txt\n";
        let report = validate(&parse(doc).unwrap(), &left, &right).unwrap();
        assert_eq!(report.checked, 1);
    }

    #[test]
    fn test_validate_rejects_same_or_nested_roots() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        write(&root, "keep.txt", "precious");
        let file = parse("[>] : MODIFIED : keep.txt\n").unwrap();

        let err = validate(&file, &root, &root).unwrap_err();
        assert!(matches!(err, ActionFileError::OverlappingRoots { .. }));

        let nested = root.join("sub");
        fs::create_dir(&nested).unwrap();
        let err = validate(&file, &root, &nested).unwrap_err();
        assert!(matches!(err, ActionFileError::OverlappingRoots { .. }));
        let err = validate(&file, &nested, &root).unwrap_err();
        assert!(matches!(err, ActionFileError::OverlappingRoots { .. }));

        assert_eq!(fs::read_to_string(root.join("keep.txt")).unwrap(), "precious");
    }

    #[test]
    fn test_validate_warns_on_changed_source() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "v1");
        let doc = action_doc(&left, &right)
            .replace("[i] : ONLY_IN_LEFT : a.txt", "[>] : ONLY_IN_LEFT : a.txt");
        write(&left, "a.txt", "version two");

        let report = validate(&parse(&doc).unwrap(), &left, &right).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("size changed"));
    }

    // Executor

    #[test]
    fn test_modified_copy_to_right() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "X");
        write(&right, "a.txt", "Y");

        let (results, _) = run_compare(&left, &right, ComparisonOptions::default());
        assert_eq!(results[0].status, Status::Modified);
        assert_eq!(results[0].method, CompareMethod::Hash);

        let doc = action_doc(&left, &right)
            .replace("[i] : MODIFIED : a.txt", "[>] : MODIFIED : a.txt");
        let file = parse(&doc).unwrap();
        validate(&file, &left, &right).unwrap();

        let (summary, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].bytes, 1);
        assert_eq!(summary.overwritten, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(fs::read_to_string(right.join("a.txt")).unwrap(), "X");
    }

    #[test]
    fn test_only_left_delete_left_removes_path_everywhere() {
        let (_dir, left, right) = two_roots();
        write(&left, "only_left/f.txt", "f");

        let doc = action_doc(&left, &right).replace("[i] : ONLY_IN_LEFT", "[x-] : ONLY_IN_LEFT");
        let file = parse(&doc).unwrap();
        assert_eq!(file.pending().count(), 2);
        validate(&file, &left, &right).unwrap();

        let (summary, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert!(results.iter().all(|r| r.success));
        assert_eq!(summary.failed, 0);
        assert!(!left.join("only_left/f.txt").exists());
        assert!(!left.join("only_left").exists());
        assert!(!right.join("only_left/f.txt").exists());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, left, right) = two_roots();
        write(&right, "extra.txt", "extra");

        let file = ActionFile {
            items: vec![ActionItem::new(
                ActionType::DeleteRight,
                Status::OnlyRight,
                "extra.txt",
            )],
            ..Default::default()
        };

        let (first, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert!(results[0].success);
        assert_eq!(first.deleted, 1);
        assert!(!right.join("extra.txt").exists());

        let (second, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert!(results[0].success);
        assert_eq!(second.failed, 0);
        assert_eq!(second.deleted, 0);
        assert!(results[0].message.contains("already absent"));
    }

    #[test]
    fn test_delete_both_attempts_each_side() {
        let (_dir, left, right) = two_roots();
        write(&left, "both.txt", "abc");

        let file = ActionFile {
            items: vec![ActionItem::new(ActionType::DeleteBoth, Status::OnlyLeft, "both.txt")],
            ..Default::default()
        };
        let (summary, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert!(results[0].success);
        assert_eq!(summary.deleted, 1);
        assert_eq!(results[0].bytes, 3);
        assert!(!left.join("both.txt").exists());
    }

    #[test]
    fn test_copy_creates_parent_directories() {
        let (_dir, left, right) = two_roots();
        write(&right, "deep/nested/file.txt", "content");

        let doc = action_doc(&left, &right).replace("[i] : ONLY_IN_RIGHT", "[<] : ONLY_IN_RIGHT");
        let file = parse(&doc).unwrap();
        validate(&file, &left, &right).unwrap();
        let (summary, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();

        assert!(results.iter().all(|r| r.success));
        assert_eq!(summary.created, 3);
        assert_eq!(
            fs::read_to_string(left.join("deep/nested/file.txt")).unwrap(),
            "content"
        );
    }

    #[test]
    fn test_ignore_and_failures_do_not_stop_queue() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "a");

        let file = ActionFile {
            items: vec![
                ActionItem::new(ActionType::Ignore, Status::OnlyLeft, "a.txt"),
                ActionItem::new(ActionType::CopyToRight, Status::OnlyLeft, "missing.txt"),
                ActionItem::new(ActionType::CopyToRight, Status::OnlyLeft, "a.txt"),
            ],
            ..Default::default()
        };
        let (summary, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert!(right.join("a.txt").exists());
    }

    #[test]
    fn test_dry_run_matches_real_run() {
        let (_dir, left, right) = two_roots();
        write(&left, "a.txt", "new");
        write(&right, "a.txt", "old");
        write(&left, "l.txt", "l");
        write(&right, "r.txt", "r");
        write(&right, "both.txt", "b");

        let doc = "\
[>] : MODIFIED : a.txt
[>] : ONLY_IN_LEFT : l.txt
[-x] : ONLY_IN_RIGHT : r.txt
[xx] : ONLY_IN_RIGHT : both.txt
[i] : ONLY_IN_RIGHT : ignored.txt
";
        let file = parse(doc).unwrap();

        let dry = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let (dry_summary, dry_results) = execute(&file, &left, &right, dry).unwrap();
        assert!(dry_summary.dry_run);
        assert_eq!(fs::read_to_string(right.join("a.txt")).unwrap(), "old");
        assert!(!right.join("l.txt").exists());
        assert!(right.join("r.txt").exists());
        assert!(dry_results.iter().all(|r| r.message.starts_with(DRY_RUN_PREFIX)));

        let (real_summary, real_results) =
            execute(&file, &left, &right, ExecuteOptions::default()).unwrap();

        let normalize = |m: &str| m.replace(DRY_RUN_PREFIX, "").to_lowercase();
        assert_eq!(dry_results.len(), real_results.len());
        for (d, r) in dry_results.iter().zip(&real_results) {
            assert_eq!((d.action, &d.path), (r.action, &r.path));
            assert_eq!(normalize(&d.message), normalize(&r.message));
            assert_eq!(d.success, r.success);
        }
        assert_eq!(dry_summary.created, real_summary.created);
        assert_eq!(dry_summary.overwritten, real_summary.overwritten);
        assert_eq!(dry_summary.deleted, real_summary.deleted);

        assert_eq!(fs::read_to_string(right.join("a.txt")).unwrap(), "new");
        assert!(right.join("l.txt").exists());
        assert!(!right.join("r.txt").exists());
        assert!(!right.join("both.txt").exists());
    }

    #[test]
    fn test_copy_onto_itself_fails_without_truncating() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        write(&root, "keep.txt", "precious");

        let file = ActionFile {
            items: vec![ActionItem::new(ActionType::CopyToRight, Status::Modified, "keep.txt")],
            ..Default::default()
        };
        for dry_run in [true, false] {
            let options = ExecuteOptions {
                dry_run,
                ..Default::default()
            };
            let (summary, results) = execute(&file, &root, &root, options).unwrap();
            assert_eq!(summary.failed, 1);
            assert!(!results[0].success);
            assert!(results[0].error.as_deref().is_some_and(|e| e.contains("same entry")));
        }
        assert_eq!(fs::read_to_string(root.join("keep.txt")).unwrap(), "precious");
    }

    #[test]
    fn test_patch_is_never_executed() {
        let (_dir, left, right) = two_roots();
        write(&left, "p.txt", "l");
        write(&right, "p.txt", "r");
        let file = ActionFile {
            items: vec![ActionItem::new(ActionType::Patch, Status::Modified, "p.txt")],
            ..Default::default()
        };
        let (summary, results) = execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        assert_eq!(summary.failed, 1);
        assert!(!results[0].success);
        assert_eq!(fs::read_to_string(right.join("p.txt")).unwrap(), "r");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_replicates_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, left, right) = two_roots();
        write(&left, "run.sh", "#!/bin/sh\n");
        fs::set_permissions(left.join("run.sh"), fs::Permissions::from_mode(0o750)).unwrap();

        let file = ActionFile {
            items: vec![ActionItem::new(ActionType::CopyToRight, Status::OnlyLeft, "run.sh")],
            ..Default::default()
        };
        execute(&file, &left, &right, ExecuteOptions::default()).unwrap();
        let mode = fs::metadata(right.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    // Configuration

    #[test]
    fn test_config_merge() {
        let file = FileConfig::parse(
            r#"
[compare]
exclude_names = ["target", ".git"]
exclude_extensions = ["tmp"]
max_file_size = 1048576
parallel_workers = 8
algo = "blake3"
"#,
        )
        .unwrap();

        let cli = CliOverrides {
            exclude_names: vec![".git".to_string(), "node_modules".to_string()],
            threads: Some(2),
            ..Default::default()
        };
        let (options, gitignore) = merge(Some(&file), cli);

        assert_eq!(options.exclude_names, vec!["target", ".git", "node_modules"]);
        assert_eq!(options.exclude_extensions, vec!["tmp"]);
        assert_eq!(options.max_file_size, 1_048_576);
        assert_eq!(options.parallel_workers, 2);
        assert_eq!(options.algo, HashAlgo::Blake3);
        assert!(!gitignore);
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        assert!(FileConfig::parse("[compare]\nexclude = [\"x\"]\n").is_err());
    }

    #[test]
    fn test_gitignore_drops_directory_globs() {
        let excludes = translate("docs/*.md\n/*.log\nsrc/**/gen\nout/\n");
        assert!(excludes.paths.is_empty());
        assert!(excludes.extensions.is_empty());
        assert_eq!(excludes.names, vec!["out"]);
        assert_eq!(excludes.unsupported, vec!["docs/*.md", "/*.log", "src/**/gen"]);
    }

    #[test]
    fn test_gitignore_translation() {
        let excludes = translate(
            "# comment\n\nnode_modules/\n*.log\n/build\ndocs/tmp\n**/cache\n!keep.log\n*.tar.gz\n",
        );
        assert_eq!(excludes.names, vec!["node_modules", "cache", "*.tar.gz"]);
        assert_eq!(excludes.paths, vec!["build", "docs/tmp"]);
        assert_eq!(excludes.extensions, vec!["log"]);

        let mut options = ComparisonOptions::default();
        excludes.merge_into(&mut options);
        let filter = Filter::from_options(&options);
        assert!(filter.should_exclude("web/node_modules", true));
        assert!(filter.should_exclude("x/y.log", false));
        assert!(filter.should_exclude("build/a.o", false));
        assert!(filter.should_exclude("pkg.tar.gz", false));
        assert!(!filter.should_exclude("src/build.rs", false));
    }
}

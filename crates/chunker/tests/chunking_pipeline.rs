use docindex_chunker::{
    Chunker, ChunkerError, ChunkingConfig, DocumentFormat, Metadata, ScanOptions,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn words(count: usize) -> String {
    (0..count).map(|i| format!("w{i:04} ")).collect()
}

#[test]
fn fixed_size_windows_overlap_and_cover_text() {
    let text = words(200);
    let chunker = Chunker::new(ChunkingConfig::fixed_size(500, 50)).expect("valid config");
    let chunks = chunker.chunk_text(&text, &Metadata::new()).expect("chunking failed");

    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.chunk_index, i);
        assert_eq!(chunk.metadata.total_chunks, 3);
        assert!(!chunk.content.is_empty());
    }

    assert!(chunks[0].content.starts_with("w0000"));
    assert!(chunks[2].content.ends_with("w0199"));

    for pair in chunks.windows(2) {
        let prev_end = text.find(&pair[0].content).unwrap() + pair[0].content.len();
        let next_start = text.find(&pair[1].content).unwrap();
        assert!(next_start < prev_end, "consecutive windows should overlap");
        assert!(prev_end - next_start <= 50);
    }
}

#[test]
fn file_chunks_carry_file_metadata() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Guide.MD");
    fs::write(&path, "# Title\n\nBody paragraph.\n").unwrap();

    let mut meta = Metadata::new();
    meta.insert("team".to_string(), json!("docs"));

    let chunker = Chunker::new(ChunkingConfig::paragraph()).unwrap();
    let chunks = chunker.chunk_file(&path, &meta).unwrap();
    assert_eq!(chunks.len(), 2);

    let map = chunks[1].metadata.clone().into_map();
    assert_eq!(map.get("team"), Some(&json!("docs")));
    assert_eq!(map.get("file_name"), Some(&json!("Guide.MD")));
    assert_eq!(map.get("file_extension"), Some(&json!(".md")));
    assert_eq!(map.get("chunk_index"), Some(&json!(1)));
    assert_eq!(map.get("total_chunks"), Some(&json!(2)));
    assert_eq!(
        map.get("file_path").and_then(Value::as_str),
        Some(path.to_string_lossy().as_ref())
    );
}

#[test]
fn single_file_with_unknown_extension_is_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("photo.png");
    fs::write(&path, b"\x89PNG").unwrap();

    let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
    let err = chunker.chunk_file(&path, &Metadata::new()).unwrap_err();
    assert!(matches!(err, ChunkerError::UnsupportedFormat(_)));
}

#[test]
fn directory_batch_survives_bad_files() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();

    fs::write(root.join("a.txt"), "Alpha document.").unwrap();
    fs::write(root.join("nested").join("b.md"), "Beta document.").unwrap();
    fs::write(root.join("nested").join("script.py"), "print('gamma')").unwrap();
    fs::write(root.join("broken.docx"), b"this is not a zip archive").unwrap();
    fs::write(root.join("blank.txt"), "   \n").unwrap();
    fs::write(root.join("target").join("skipped.txt"), "build output").unwrap();

    let chunker = Chunker::new(ChunkingConfig::no_chunking()).unwrap();
    let result = chunker
        .chunk_directory(root, &ScanOptions::default(), &Metadata::new())
        .expect("walk should succeed");

    let processed: Vec<String> = result
        .files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(processed, vec!["a.txt", "b.md", "script.py"]);
    assert_eq!(result.total_chunks(), 3);

    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].path.ends_with("broken.docx"));
    assert_eq!(result.skipped.len(), 1);

    let contents: Vec<String> = result.into_chunks().map(|c| c.content).collect();
    assert_eq!(
        contents,
        vec!["Alpha document.", "Beta document.", "print('gamma')"]
    );
}

#[test]
fn docx_bytes_flow_through_strategy() {
    use std::io::{Cursor, Write};

    let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>One sentence here. Another one follows.</w:t></w:r></w:p>
<w:p><w:r><w:t>A second paragraph.</w:t></w:r></w:p>
</w:body></w:document>"#;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let chunker = Chunker::new(ChunkingConfig::sentence(40, 0)).unwrap();
    let chunks = chunker
        .chunk_bytes(&bytes, DocumentFormat::Docx, &Metadata::new())
        .unwrap();
    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "One sentence here. Another one follows.",
            "A second paragraph."
        ]
    );
}

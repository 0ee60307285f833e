use crate::{CollectionCommand, Commands, DocAddArgs, DocCommand, DocIngestArgs, IndexCommand, SearchArgs};
use anyhow::{anyhow, Context as AnyhowContext, Result};
use docindex_indexer::{
    Collection, DocIndexConfig, DocIndexService, Document, DocumentId, IngestReport, Metadata,
    ScanOptions, SearchQuery,
};
use serde_json::{json, Value};
use std::io::Read;

pub async fn dispatch(
    service: &DocIndexService,
    config: &DocIndexConfig,
    command: Commands,
) -> Result<Value> {
    match command {
        Commands::Collection(cmd) => run_collection(service, cmd).await,
        Commands::Doc(cmd) => run_doc(service, config, cmd).await,
        Commands::Index(cmd) => run_index(service, cmd).await,
        Commands::Search(args) => run_search(service, args).await,
    }
}

async fn run_collection(service: &DocIndexService, cmd: CollectionCommand) -> Result<Value> {
    match cmd {
        CollectionCommand::Create { name, description } => {
            let created = service
                .create_collection(&name, description.as_deref())
                .await?;
            Ok(serde_json::to_value(created)?)
        }
        CollectionCommand::List => Ok(serde_json::to_value(service.list_collections().await?)?),
        CollectionCommand::Get { collection } => {
            Ok(serde_json::to_value(resolve(service, &collection).await?)?)
        }
        CollectionCommand::Delete { collection } => {
            let found = resolve(service, &collection).await?;
            service.delete_collection(found.id).await?;
            Ok(json!({ "deleted": found.id, "name": found.name }))
        }
        CollectionCommand::Describe {
            collection,
            description,
        } => {
            let found = resolve(service, &collection).await?;
            let updated = service
                .update_description(found.id, description.as_deref())
                .await?;
            Ok(serde_json::to_value(updated)?)
        }
    }
}

async fn run_doc(
    service: &DocIndexService,
    config: &DocIndexConfig,
    cmd: DocCommand,
) -> Result<Value> {
    match cmd {
        DocCommand::Add(args) => add_document(service, config, args).await,
        DocCommand::Ingest(args) => ingest(service, config, args).await,
        DocCommand::List {
            collection,
            embeddings,
        } => {
            let found = resolve(service, &collection).await?;
            let documents = service.list_documents(found.id).await?;
            Ok(serde_json::to_value(present(documents, embeddings))?)
        }
        DocCommand::Get {
            collection,
            id,
            embeddings,
        } => {
            let found = resolve(service, &collection).await?;
            let document = service.get_document(found.id, DocumentId(id)).await?;
            let mut shown = present(vec![document], embeddings);
            Ok(serde_json::to_value(shown.pop())?)
        }
        DocCommand::Delete { collection, ids } => {
            let found = resolve(service, &collection).await?;
            // A single id reports NotFound; a batch reports how many existed.
            let deleted = if let [id] = ids[..] {
                service.delete_document(found.id, DocumentId(id)).await?;
                1
            } else {
                let ids = ids.into_iter().map(DocumentId).collect();
                service.delete_documents(found.id, ids).await?
            };
            Ok(json!({ "collection_id": found.id, "deleted": deleted }))
        }
    }
}

async fn add_document(
    service: &DocIndexService,
    config: &DocIndexConfig,
    args: DocAddArgs,
) -> Result<Value> {
    let found = resolve(service, &args.collection).await?;
    let text = match args.text {
        Some(text) => text,
        None => read_stdin()?,
    };
    let metadata = parse_metadata(args.metadata.as_deref())?;

    if args.chunk {
        let chunking = args.chunking.resolve(&config.chunking);
        let report = service.add_text(found.id, &text, metadata, chunking).await?;
        return Ok(summarize(&found, &report));
    }

    let embedding = args
        .embedding
        .as_deref()
        .map(parse_vector)
        .transpose()?;
    let document = service
        .add_document(found.id, &text, metadata, embedding)
        .await?;
    let mut shown = present(vec![document], false);
    Ok(serde_json::to_value(shown.pop())?)
}

async fn ingest(
    service: &DocIndexService,
    config: &DocIndexConfig,
    args: DocIngestArgs,
) -> Result<Value> {
    let found = resolve(service, &args.collection).await?;
    let metadata = parse_metadata(args.metadata.as_deref())?;
    let chunking = args.chunking.resolve(&config.chunking);

    let report = if args.path.is_dir() {
        let mut options = ScanOptions::default().recursive(!args.no_recursive);
        options.include_hidden = args.include_hidden;
        for pattern in args.ignore {
            options = options.ignore_pattern(pattern);
        }
        service
            .ingest_directory(found.id, &args.path, options, chunking, metadata)
            .await?
    } else {
        service
            .ingest_file(found.id, &args.path, chunking, metadata)
            .await?
    };

    for failure in &report.files_failed {
        log::warn!("Skipped {}: {}", failure.path.display(), failure.message);
    }
    Ok(summarize(&found, &report))
}

async fn run_index(service: &DocIndexService, cmd: IndexCommand) -> Result<Value> {
    let state = match cmd {
        IndexCommand::Rebuild { collection } => {
            let found = resolve(service, &collection).await?;
            service.rebuild_index(found.id).await?
        }
        IndexCommand::Verify { collection } => {
            let found = resolve(service, &collection).await?;
            service.verify_index(found.id).await?
        }
        IndexCommand::State { collection } => {
            let found = resolve(service, &collection).await?;
            service.index_state(found.id).await?
        }
    };
    Ok(serde_json::to_value(state)?)
}

async fn run_search(service: &DocIndexService, args: SearchArgs) -> Result<Value> {
    let found = resolve(service, &args.collection).await?;
    let query = match (args.vector, args.query) {
        (Some(raw), _) => SearchQuery::Vector(parse_vector(&raw)?),
        (None, Some(text)) => SearchQuery::Text(text),
        (None, None) => return Err(anyhow!("either a query or --vector is required")),
    };

    let results = service.search_similar(found.id, query, args.k).await?;
    Ok(serde_json::to_value(present(results, args.embeddings))?)
}

async fn resolve(service: &DocIndexService, collection: &str) -> Result<Collection> {
    Ok(service.resolve_collection(collection).await?)
}

fn summarize(collection: &Collection, report: &IngestReport) -> Value {
    json!({
        "collection_id": collection.id,
        "files_processed": report.files_processed,
        "files_failed": report.files_failed,
        "documents_added": report.documents.len(),
        "document_ids": report.document_ids(),
    })
}

/// Drop embedding vectors unless they were asked for
fn present(mut documents: Vec<Document>, embeddings: bool) -> Vec<Document> {
    if !embeddings {
        for document in &mut documents {
            document.embedding.clear();
        }
    }
    documents
}

fn parse_metadata(raw: Option<&str>) -> Result<Metadata> {
    let Some(raw) = raw else {
        return Ok(Metadata::new());
    };
    match serde_json::from_str::<Value>(raw).context("--metadata is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("--metadata must be a JSON object, got {other}")),
    }
}

fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    serde_json::from_str(raw).context("embedding must be a JSON array of numbers")
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read document text from stdin")?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_must_be_an_object() {
        assert_eq!(parse_metadata(None).unwrap(), Metadata::new());

        let parsed = parse_metadata(Some(r#"{"source":"manual","page":3}"#)).unwrap();
        assert_eq!(parsed["page"], json!(3));

        assert!(parse_metadata(Some("[1, 2]")).is_err());
        assert!(parse_metadata(Some("{oops")).is_err());
    }

    #[test]
    fn vectors_parse_from_json_arrays() {
        assert_eq!(parse_vector("[0.5, -1, 2e-1]").unwrap(), vec![0.5, -1.0, 0.2]);
        assert!(parse_vector(r#"["a"]"#).is_err());
    }
}

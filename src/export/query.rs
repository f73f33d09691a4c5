//! Warehouse query export.

use tokio::runtime::Handle;
use tracing::info;

use crate::error::AppError;
use crate::export::{ensure_output_dir, join_error, QueryExportRequest};
use crate::snowflake::{SessionConfig, SqlApiCursor, StatementClient};
use crate::source::{QueryCursor, RemoteQuerySource};
use crate::streaming::{ChunkSummary, ChunkWriter};

/// Runs `request.query` on `cursor` and splits the result into parts.
///
/// Blocks the calling thread. The cursor is closed before returning.
pub fn export_from_cursor<C: QueryCursor>(
    writer: &ChunkWriter,
    cursor: C,
    request: &QueryExportRequest,
    batch_size: usize,
) -> Result<ChunkSummary, AppError> {
    announce(writer, "Running query…");

    let source = RemoteQuerySource::open_with_batch_size(cursor, &request.query, batch_size)?;
    let summary = writer.run(source, &request.output_dir, &request.base_name)?;

    info!(
        files = summary.files_written,
        rows = summary.rows_written,
        "Query export complete"
    );
    Ok(summary)
}

/// Exports warehouse query results into parts.
///
/// Settings, query text and output folder are checked before any network
/// traffic. The chunk writer runs on a blocking worker thread and drives the
/// HTTP client through the current runtime.
///
/// # Errors
///
/// - `AppError::Config` - invalid session settings, blank query, or missing
///   output folder
/// - upstream errors from the warehouse
/// - anything [`ChunkWriter::run`] returns
pub async fn export_query(
    session: SessionConfig,
    writer: ChunkWriter,
    request: QueryExportRequest,
) -> Result<ChunkSummary, AppError> {
    session.validate()?;
    if request.query.trim().is_empty() {
        return Err(AppError::Config("Query is empty.".to_string()));
    }
    ensure_output_dir(&request.output_dir)?;

    announce(&writer, "Connecting to warehouse…");
    let client = StatementClient::new(session)?;
    let batch_size = client.session().fetch_batch_size;
    let runtime = Handle::current();

    tokio::task::spawn_blocking(move || {
        let cursor = SqlApiCursor::new(client, runtime);
        export_from_cursor(&writer, cursor, &request, batch_size)
    })
    .await
    .map_err(join_error)?
}

fn announce(writer: &ChunkWriter, message: &str) {
    info!("{}", message);
    writer.log(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Row;
    use crate::streaming::{ChunkConfig, ChunkObserver};
    use secrecy::SecretString;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingObserver {
        logs: Mutex<Vec<String>>,
    }

    impl ChunkObserver for RecordingObserver {
        fn on_log(&self, message: &str) {
            self.logs.lock().unwrap().push(message.to_string());
        }
    }

    struct StaticCursor {
        columns: Vec<String>,
        rows: Vec<Row>,
    }

    impl QueryCursor for StaticCursor {
        fn execute(&mut self, _query: &str) -> Result<Vec<String>, AppError> {
            Ok(self.columns.clone())
        }

        fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, AppError> {
            let take = size.min(self.rows.len());
            Ok(self.rows.drain(..take).collect())
        }

        fn close(&mut self) {}
    }

    fn session(url: &str, user: &str) -> SessionConfig {
        let mut session = SessionConfig::new(
            Url::parse(url).unwrap(),
            user,
            SecretString::from("test_token".to_string()),
        );
        session.poll_interval = Duration::from_millis(10);
        session
    }

    fn request(dir: &TempDir, query: &str) -> QueryExportRequest {
        QueryExportRequest {
            query: query.to_string(),
            output_dir: dir.path().to_path_buf(),
            base_name: "LOCPRIORITY_UPLOAD".to_string(),
        }
    }

    #[test]
    fn test_export_from_cursor_reorders_columns() {
        let dir = TempDir::new().unwrap();
        let cursor = StaticCursor {
            columns: vec!["QTY".into(), "LOC".into(), "ITEM".into(), "LOCPRIORITY".into()],
            rows: vec![
                Row::new(vec![Some("5".into()), Some("L1".into()), Some("A".into()), Some("1".into())]),
                Row::new(vec![None, Some("L2".into()), Some("B".into()), Some("2".into())]),
            ],
        };

        let summary = export_from_cursor(&ChunkWriter::default(), cursor, &request(&dir, "select 1"), 1)
            .unwrap();
        assert_eq!(summary.rows_written, 2);

        let content = fs::read_to_string(dir.path().join("LOCPRIORITY_UPLOAD_001.csv")).unwrap();
        assert_eq!(
            content,
            "ITEM,LOC,LOCPRIORITY,QTY\r\nA,L1,1,5\r\nB,L2,2,\r\n"
        );
    }

    #[tokio::test]
    async fn test_export_query_rejects_bad_email_first() {
        let dir = TempDir::new().unwrap();
        let result = export_query(
            session("https://acme.snowflakecomputing.com", "not-an-email"),
            ChunkWriter::default(),
            request(&dir, ""),
        )
        .await;

        match result {
            Err(AppError::Config(msg)) => assert!(msg.contains("valid email")),
            other => panic!("Expected Config error, got {:?}", other.map(|s| s.files_written)),
        }
    }

    #[tokio::test]
    async fn test_export_query_rejects_blank_query() {
        let dir = TempDir::new().unwrap();
        let result = export_query(
            session("https://acme.snowflakecomputing.com", "name@example.com"),
            ChunkWriter::default(),
            request(&dir, "  \n"),
        )
        .await;

        match result {
            Err(AppError::Config(msg)) => assert_eq!(msg, "Query is empty."),
            other => panic!("Expected Config error, got {:?}", other.map(|s| s.files_written)),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_query_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/statements"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "statementHandle": "01aa-handle",
                "resultSetMetaData": {
                    "rowType": [{"name": "ITEM"}, {"name": "LOC"}, {"name": "LOCPRIORITY"}],
                    "partitionInfo": [{"rowCount": 3}]
                },
                "data": [["A", "L1", "1"], ["B", "L2", "2"], ["C", "L3", "3"]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let writer = ChunkWriter::new(
            ChunkConfig::default().max_rows(crate::config::RowBudget::new(2).unwrap()),
        )
        .with_observer(observer.clone());

        let summary = export_query(
            session(&server.uri(), "name@example.com"),
            writer,
            request(&dir, "select item, loc, locpriority from t"),
        )
        .await
        .unwrap();

        assert_eq!(summary.files_written, 2);
        assert_eq!(summary.rows_per_file, vec![2, 1]);

        let logs = observer.logs.lock().unwrap();
        assert_eq!(logs[0], "Connecting to warehouse…");
        assert_eq!(logs[1], "Running query…");
        assert!(logs.iter().any(|l| l == "Writing: LOCPRIORITY_UPLOAD_002.csv"));
    }
}

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::app::{PosmonError, Result};
use crate::domain::{Category, StationRecord};
use crate::scraper::schema::ColumnSchema;
use crate::scraper::{render_page, SessionManager};

/// Largest `colspan` honoured when expanding header cells
const MAX_COLSPAN: usize = 64;

/// Extracts one category's station table into typed records
pub struct TableExtractor {
    schema: ColumnSchema,
}

impl TableExtractor {
    pub fn new(category: Category) -> Self {
        Self {
            schema: ColumnSchema::for_category(category),
        }
    }

    pub fn category(&self) -> Category {
        self.schema.category
    }

    /// Load the monitoring page in a fresh browser session and extract the
    /// category's table from it
    pub async fn scrape(&self, sessions: &dyn SessionManager, url: &str) -> Result<Vec<StationRecord>> {
        let category = self.category();
        info!("Loading {} table from {}", category.label(), url);

        let html = render_page(sessions, url, &category.ready_selector()).await?;
        let records = self.extract(&html)?;

        info!("Extracted {} {} records", records.len(), category.label());
        if category == Category::Rainfall {
            if let Some(first) = records.first() {
                debug!(
                    "Battery sample: {} = {}",
                    first.station_name().unwrap_or("?"),
                    first.battery().unwrap_or("not found")
                );
            }
        }

        Ok(records)
    }

    /// Extract records from rendered page HTML.
    ///
    /// Only the first header row supplies labels; a second header row that
    /// subdivides grouped columns is ignored. A first row narrower than the
    /// body rows is logged and reconciled by the schema.
    pub fn extract(&self, html: &str) -> Result<Vec<StationRecord>> {
        let document = Html::parse_document(html);
        let category = self.category();

        let table_sel = selector(category.table_selector())?;
        let table = document
            .select(&table_sel)
            .next()
            .ok_or_else(|| PosmonError::TableNotFound(category.table_selector().to_string()))?;

        let headers = self.header_labels(table)?;
        debug!("{} header positions: {:?}", category, headers);

        let row_sel = selector("tbody tr")?;
        let cell_sel = selector("td")?;
        let rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|row| row.select(&cell_sel).map(cell_text).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .collect();

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if !headers.is_empty() && headers.len() < width {
            warn!(
                "{} header row has {} positions but rows have {} cells",
                category,
                headers.len(),
                width
            );
        }
        let columns = self.schema.resolve_rows(&headers, width);

        let records = rows
            .iter()
            .map(|cells| StationRecord::from_fields(category, columns.map_row(cells)))
            .collect();

        Ok(records)
    }

    /// Labels of the first header row, one entry per column position
    fn header_labels(&self, table: ElementRef<'_>) -> Result<Vec<String>> {
        let first_row_sel = selector("thead tr")?;
        let header_cell_sel = selector("th, td")?;

        let Some(first_row) = table.select(&first_row_sel).next() else {
            return Ok(Vec::new());
        };

        let mut headers = Vec::new();
        for cell in first_row.select(&header_cell_sel) {
            let label = self.schema.normalize_header(&cell.text().collect::<String>());
            let span = cell
                .value()
                .attr("colspan")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1)
                .clamp(1, MAX_COLSPAN);
            headers.extend(std::iter::repeat_n(label, span));
        }

        Ok(headers)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PosmonError::Parse(format!("invalid CSS selector '{}': {}", css, e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

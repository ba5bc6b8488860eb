//! End-to-end runs of each view: load → reconcile → filter → aggregate →
//! report.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::aggregate::recompute_margins;
use crate::config::{Config, Field, UnsoldBasis};
use crate::error::Result;
use crate::filter::{FilterSet, distinct_outlets};
use crate::ingest;
use crate::io::excel_read::{SheetRequest, WorkbookCache};
use crate::io::excel_write;
use crate::model::Record;
use crate::reconcile::{self, CreditNoteSet};
use crate::report::{Report, views};

/// Loads the shared state of one run and dispatches to the views.
#[derive(Debug)]
pub struct Dashboard {
    config: Config,
    cache: WorkbookCache,
}

impl Dashboard {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: WorkbookCache::new(),
        }
    }

    fn load_records(&mut self, request: &SheetRequest, required: &[Field]) -> Result<Vec<Record>> {
        let table = self.cache.load(request)?;
        let mut records = ingest::records_from_table(table, &self.config.aliases, required)?;
        if self.config.recompute_margins {
            recompute_margins(&mut records);
        }
        info!(
            path = %request.path.display(),
            records = records.len(),
            "records loaded"
        );
        Ok(records)
    }

    fn load_credit_notes(&mut self, request: &SheetRequest) -> Result<CreditNoteSet> {
        let table = self.cache.load(request)?;
        let codes = ingest::credit_codes_from_table(table, &self.config.aliases)?;
        let set: CreditNoteSet = codes.into_iter().collect();
        info!(path = %request.path.display(), codes = set.len(), "credit notes loaded");
        Ok(set)
    }

    /// Loads records and, when a credit-note sheet is given, flags the rows
    /// whose code it lists.
    fn load_flagged_records(
        &mut self,
        request: &SheetRequest,
        required: &[Field],
        credit_notes: Option<&SheetRequest>,
    ) -> Result<Vec<Record>> {
        let mut records = self.load_records(request, required)?;
        if let Some(credit_notes) = credit_notes {
            let set = self.load_credit_notes(credit_notes)?;
            let flagged = reconcile::flag_credit_notes(&mut records, &set);
            info!(flagged, records = records.len(), "records flagged against credit notes");
        }
        Ok(records)
    }

    fn apply_filters(&self, records: &[Record], filters: &FilterSet) -> Vec<Record> {
        if filters.has_outlet_filter() {
            let known = distinct_outlets(records);
            for outlet in filters
                .outlets
                .iter()
                .filter(|outlet| !known.iter().any(|name| name == outlet.trim()))
            {
                warn!(outlet = %outlet, available = ?known, "selected outlet not present in data");
            }
        }
        let filtered = filters.apply(records, &self.config.cover);
        debug!(kept = filtered.len(), "filters applied");
        filtered
    }

    fn unsold_fields(&self) -> &'static [Field] {
        match self.config.unsold_basis {
            UnsoldBasis::PurchasedMinusSold => &[Field::QtyPurchased, Field::QtySold],
            UnsoldBasis::StockOnHand => &[Field::QtyPurchased, Field::QtySold, Field::Stock],
        }
    }

    /// Purchase and profit per item. With a credit-note sheet the rows carry
    /// a credit-note column.
    #[instrument(level = "info", skip_all, fields(sales = %sales.path.display()))]
    pub fn purchase(
        &mut self,
        sales: &SheetRequest,
        credit_notes: Option<&SheetRequest>,
        filters: &FilterSet,
    ) -> Result<Report> {
        let mut required = vec![Field::ItemName, Field::Outlet, Field::PurchaseValue, Field::Profit];
        if credit_notes.is_some() {
            required.push(Field::ItemCode);
        }
        let records = self.load_flagged_records(sales, &required, credit_notes)?;
        let filtered = self.apply_filters(&records, filters);
        Ok(views::purchase(&filtered, filters, &self.config, credit_notes.is_some()))
    }

    /// Purchased against sold quantities.
    #[instrument(level = "info", skip_all, fields(sales = %sales.path.display()))]
    pub fn variance(
        &mut self,
        sales: &SheetRequest,
        credit_notes: Option<&SheetRequest>,
        filters: &FilterSet,
    ) -> Result<Report> {
        let mut required = vec![Field::ItemName, Field::Outlet];
        required.extend_from_slice(self.unsold_fields());
        if credit_notes.is_some() {
            required.push(Field::ItemCode);
        }
        let records = self.load_flagged_records(sales, &required, credit_notes)?;
        let filtered = self.apply_filters(&records, filters);
        Ok(views::variance(&filtered, filters, &self.config, credit_notes.is_some()))
    }

    /// Negative-margin sales rows whose item has no credit note.
    #[instrument(
        level = "info",
        skip_all,
        fields(sales = %sales.path.display(), credit_notes = %credit_notes.path.display())
    )]
    pub fn credit_notes(
        &mut self,
        sales: &SheetRequest,
        credit_notes: &SheetRequest,
        filters: &FilterSet,
    ) -> Result<Report> {
        let mut records = self.load_records(
            sales,
            &[
                Field::ItemCode,
                Field::ItemName,
                Field::Category,
                Field::SalesValue,
                Field::Profit,
            ],
        )?;
        let set = self.load_credit_notes(credit_notes)?;
        reconcile::flag_credit_notes(&mut records, &set);
        let filtered = self.apply_filters(&records, filters);
        let flagged = filtered.iter().filter(|record| record.has_credit_note).count();
        let unmatched = reconcile::unmatched_negative_margin(&filtered, &set);
        Ok(views::credit_notes(&unmatched, flagged, &self.config))
    }

    /// Months of cover per item. Without a sales sheet the aging sheet alone
    /// supplies the records.
    #[instrument(level = "info", skip_all, fields(aging = %aging.path.display()))]
    pub fn stock_cover(
        &mut self,
        sales: Option<&SheetRequest>,
        aging: &SheetRequest,
        filters: &FilterSet,
    ) -> Result<Report> {
        let entries = {
            let table = self.cache.load(aging)?;
            ingest::aging_from_table(table, &self.config.aliases)?
        };

        let records = match sales {
            Some(sales) => {
                let mut records = self.load_records(
                    sales,
                    &[Field::ItemCode, Field::ItemName, Field::Category],
                )?;
                let summary = reconcile::merge_aging(&mut records, &entries);
                if summary.unmatched > 0 {
                    warn!(
                        matched = summary.matched,
                        unmatched = summary.unmatched,
                        "sales rows without an aging entry are left out of the cover table"
                    );
                }
                records
            }
            None => reconcile::records_from_aging(&entries),
        };

        let filtered = self.apply_filters(&records, filters);
        Ok(views::stock_cover(&filtered, &self.config))
    }
}

/// Writes the report's row table to a workbook.
#[instrument(level = "info", skip(report), fields(output = %output.display()))]
pub fn export(report: &Report, output: &Path) -> Result<()> {
    excel_write::write_table(output, &report.table)?;
    info!(rows = report.table.len(), "report exported");
    Ok(())
}

//! Typed spreadsheet rows
//!
//! Spreadsheets arrive with many spellings of the same column ("RBD",
//! "Código RBD", "school_code", ...). Headers are resolved once against an
//! alias table; everything past this module only sees `Row`.

use std::collections::HashMap;

use super::error::ImportError;
use super::normalize::strip_accents;

/// Canonical spreadsheet fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SchoolName,
    SchoolCode,
    Commune,
    SchoolOrder,
    CourseName,
    CourseYear,
    CourseOrder,
    Grade,
    Level,
    SubjectName,
    SubjectOrder,
    ListName,
    ListYear,
    ListUpdatedAt,
    ListPublishedAt,
    SourceUrl,
    ListOrder,
    ItemName,
    ItemCode,
    Isbn,
    Author,
    Publisher,
    Quantity,
    Notes,
    UsageMonth,
    ItemOrder,
}

impl Field {
    pub const ALL: [Field; 26] = [
        Field::SchoolName,
        Field::SchoolCode,
        Field::Commune,
        Field::SchoolOrder,
        Field::CourseName,
        Field::CourseYear,
        Field::CourseOrder,
        Field::Grade,
        Field::Level,
        Field::SubjectName,
        Field::SubjectOrder,
        Field::ListName,
        Field::ListYear,
        Field::ListUpdatedAt,
        Field::ListPublishedAt,
        Field::SourceUrl,
        Field::ListOrder,
        Field::ItemName,
        Field::ItemCode,
        Field::Isbn,
        Field::Author,
        Field::Publisher,
        Field::Quantity,
        Field::Notes,
        Field::UsageMonth,
        Field::ItemOrder,
    ];

    /// Accepted header spellings, already folded (see `fold_header`)
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::SchoolName => &[
                "colegio",
                "nombrecolegio",
                "colegionombre",
                "establecimiento",
                "nombreestablecimiento",
                "school",
                "schoolname",
            ],
            Field::SchoolCode => &["rbd", "codigorbd", "rbdcolegio", "codigocolegio", "schoolcode", "schoolrbd"],
            Field::Commune => &["comuna", "commune"],
            Field::SchoolOrder => &["ordencolegio", "schoolorder"],
            Field::CourseName => &["curso", "nombrecurso", "course", "coursename"],
            Field::CourseYear => &["ano", "anio", "anocurso", "aniocurso", "year", "courseyear"],
            Field::CourseOrder => &["ordencurso", "courseorder"],
            Field::Grade => &["grado", "grade"],
            Field::Level => &["nivel", "ciclo", "level"],
            Field::SubjectName => &["asignatura", "nombreasignatura", "materia", "subject", "subjectname"],
            Field::SubjectOrder => &["ordenasignatura", "subjectorder"],
            Field::ListName => &["lista", "nombrelista", "list", "listname"],
            Field::ListYear => &["anolista", "aniolista", "listyear"],
            Field::ListUpdatedAt => &[
                "fechaactualizacion",
                "actualizacion",
                "ultimaactualizacion",
                "updatedat",
                "lastupdate",
            ],
            Field::ListPublishedAt => &["fechapublicacion", "publicacion", "publishedat", "publishdate"],
            Field::SourceUrl => &["url", "urls", "urlpdf", "urllista", "enlace", "link", "sourceurl", "pdfurl"],
            Field::ListOrder => &["ordenlista", "listorder"],
            Field::ItemName => &[
                "producto",
                "nombreproducto",
                "material",
                "articulo",
                "item",
                "itemname",
                "product",
            ],
            Field::ItemCode => &["codigo", "codigoproducto", "sku", "itemcode", "code"],
            Field::Isbn => &["isbn"],
            Field::Author => &["autor", "author"],
            Field::Publisher => &["editorial", "publisher"],
            Field::Quantity => &["cantidad", "cant", "qty", "quantity"],
            Field::Notes => &["observaciones", "observacion", "notas", "nota", "comentario", "notes"],
            Field::UsageMonth => &["mes", "mesuso", "mesdeuso", "usagemonth"],
            Field::ItemOrder => &["orden", "ordenproducto", "itemorder", "order"],
        }
    }
}

/// Fold a header for alias comparison: lowercase, no accents, alphanumerics only
pub fn fold_header(header: &str) -> String {
    strip_accents(&header.to_lowercase())
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Column positions of the canonical fields found in a header row
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
    unknown: Vec<String>,
}

impl ColumnMap {
    /// Resolve a header row. The first column matching a field wins; columns
    /// matching nothing are remembered but otherwise ignored.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let lookup: HashMap<&'static str, Field> = Field::ALL
            .iter()
            .flat_map(|field| field.aliases().iter().map(move |alias| (*alias, *field)))
            .collect();

        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.as_ref();
            let folded = fold_header(header);
            if folded.is_empty() {
                continue;
            }
            match lookup.get(folded.as_str()) {
                Some(field) => {
                    map.columns.entry(*field).or_insert(idx);
                }
                None => map.unknown.push(header.trim().to_string()),
            }
        }
        map
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Headers that matched no known field
    pub fn unknown_columns(&self) -> &[String] {
        &self.unknown
    }

    /// Whether the header row can produce usable rows at all
    pub fn is_importable(&self) -> bool {
        (self.contains(Field::SchoolCode) || self.contains(Field::SchoolName))
            && self.contains(Field::CourseName)
            && self.contains(Field::SubjectName)
            && self.contains(Field::ItemName)
    }

    /// Build a typed row from one record's cells
    pub fn row<S: AsRef<str>>(&self, line: usize, cells: &[S]) -> Row {
        let text = |field: Field| -> Option<String> {
            let idx = self.get(field)?;
            let value = cells.get(idx)?.as_ref().trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };
        let int = |field: Field| text(field).and_then(|v| parse_int(&v));

        Row {
            line,
            school_name: text(Field::SchoolName),
            school_code: text(Field::SchoolCode),
            commune: text(Field::Commune),
            school_order: int(Field::SchoolOrder),
            course_name: text(Field::CourseName),
            course_year: int(Field::CourseYear).and_then(|y| u16::try_from(y).ok()),
            course_order: int(Field::CourseOrder),
            grade: int(Field::Grade).and_then(|g| u8::try_from(g).ok()),
            level: text(Field::Level),
            subject_name: text(Field::SubjectName),
            subject_order: int(Field::SubjectOrder),
            list_name: text(Field::ListName),
            list_year: int(Field::ListYear).and_then(|y| u16::try_from(y).ok()),
            list_updated_at: text(Field::ListUpdatedAt),
            list_published_at: text(Field::ListPublishedAt),
            source_urls: text(Field::SourceUrl)
                .map(|v| split_urls(&v))
                .unwrap_or_default(),
            list_order: int(Field::ListOrder),
            item_name: text(Field::ItemName),
            item_code: text(Field::ItemCode),
            isbn: text(Field::Isbn),
            author: text(Field::Author),
            publisher: text(Field::Publisher),
            quantity: int(Field::Quantity).and_then(|q| u32::try_from(q).ok()),
            notes: text(Field::Notes),
            usage_month: text(Field::UsageMonth),
            item_order: int(Field::ItemOrder),
        }
    }
}

/// One spreadsheet record in canonical form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// 1-based line in the source sheet, header included
    pub line: usize,
    pub school_name: Option<String>,
    pub school_code: Option<String>,
    pub commune: Option<String>,
    pub school_order: Option<i64>,
    pub course_name: Option<String>,
    pub course_year: Option<u16>,
    pub course_order: Option<i64>,
    pub grade: Option<u8>,
    pub level: Option<String>,
    pub subject_name: Option<String>,
    pub subject_order: Option<i64>,
    pub list_name: Option<String>,
    pub list_year: Option<u16>,
    pub list_updated_at: Option<String>,
    pub list_published_at: Option<String>,
    pub source_urls: Vec<String>,
    pub list_order: Option<i64>,
    pub item_name: Option<String>,
    pub item_code: Option<String>,
    pub isbn: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub quantity: Option<u32>,
    pub notes: Option<String>,
    pub usage_month: Option<String>,
    pub item_order: Option<i64>,
}

impl Row {
    /// Numeric RBD code: the leading digit run, so "12345-6" yields 12345
    pub fn numeric_school_code(&self) -> Option<u64> {
        let code = self.school_code.as_deref()?.trim();
        let digits: String = code.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    /// Reason the row cannot be imported, if any
    pub fn missing_fields(&self) -> Option<String> {
        let mut missing = Vec::new();
        if self.numeric_school_code().is_none() && self.school_name.is_none() {
            missing.push("school code or name");
        }
        if self.course_name.is_none() {
            missing.push("course");
        }
        if self.subject_name.is_none() {
            missing.push("subject");
        }
        if self.item_name.is_none() {
            missing.push("item");
        }
        if missing.is_empty() {
            None
        } else {
            Some(format!("missing {}", missing.join(", ")))
        }
    }

    /// Rows missing the minimum fields fail with `ImportError::Validation`
    pub fn validate(&self) -> Result<(), ImportError> {
        match self.missing_fields() {
            Some(reason) => Err(ImportError::Validation {
                line: self.line,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Parse integers written as "3", "3.0" or " 03 "
pub fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i64)
}

/// Split a cell holding one or more URLs
pub fn split_urls(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|'))
        .map(str::trim)
        .filter(|part| part.starts_with("http://") || part.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

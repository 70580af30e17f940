use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const TITLE: &str = "title";
pub const CONTENT: &str = "content";
pub const SOURCE: &str = "source";
pub const PAGE_NUMBER: &str = "page_number";
pub const FILE_PATH: &str = "file_path";
pub const EMBEDDING: &str = "embedding";

/// Columns returned to the router; everything except the vector.
pub const OUTPUT_FIELDS: [&str; 6] = [ID, TITLE, CONTENT, SOURCE, PAGE_NUMBER, FILE_PATH];

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ID, DataType::Utf8, false),
        Field::new(TITLE, DataType::Utf8, false),
        Field::new(CONTENT, DataType::Utf8, false),
        Field::new(SOURCE, DataType::Utf8, false),
        Field::new(PAGE_NUMBER, DataType::Int32, true),
        Field::new(FILE_PATH, DataType::Utf8, true),
        Field::new(EMBEDDING, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

/// Dimension of the `embedding` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(EMBEDDING).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

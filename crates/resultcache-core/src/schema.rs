use crate::types::DataType;
use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Textual `name Type` form used when describing a whole schema.
    pub fn describe(&self) -> String {
        if self.nullable {
            format!("{} Nullable({})", self.name, self.data_type)
        } else {
            format!("{} {}", self.name, self.data_type)
        }
    }

    pub fn to_arrow(&self) -> ArrowField {
        ArrowField::new(self.name.clone(), self.data_type.to_arrow(), self.nullable)
    }
}

/// Ordered output row header of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: vec![] }
    }

    /// Ordered textual description of the header, one `name Type` pair per
    /// column. Two schemas describe equally iff their ordered
    /// `(name, type, nullability)` lists are equal.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(Field::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_arrow(&self) -> ArrowSchema {
        let fields: Vec<ArrowField> = self.fields.iter().map(|f| f.to_arrow()).collect();
        ArrowSchema::new(fields)
    }

    pub fn from_arrow(schema: &ArrowSchema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|f| {
                Field::new(
                    f.name(),
                    DataType::from_arrow(f.data_type()),
                    f.is_nullable(),
                )
            })
            .collect();
        Self { fields }
    }
}

pub mod errors;

pub use errors::{ErrorCategory, ZeusDiffError, ZeusDiffResult};

use ndarray::{ArrayD, Axis, IxDyn, ShapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    Time,
    Coordinate,
    Geometry,
    Kinematic,
    Magnetic,
    PhysicalState,
    Composition,
}

/// Maps a short field name to the dataset name stored in a dump file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAlias {
    pub name: &'static str,
    pub stored_name: &'static str,
    pub category: FieldCategory,
}

const fn alias(
    name: &'static str,
    stored_name: &'static str,
    category: FieldCategory,
) -> FieldAlias {
    FieldAlias {
        name,
        stored_name,
        category,
    }
}

// Stored names are fixed-width and keep the dump writer's padding.
pub const FIELD_ALIASES: [FieldAlias; 21] = [
    alias("t", "   time", FieldCategory::Time),
    alias("x1", "i coord", FieldCategory::Coordinate),
    alias("x2", "j coord", FieldCategory::Coordinate),
    alias("x3", "k coord", FieldCategory::Coordinate),
    alias("dV1", "ivolume", FieldCategory::Geometry),
    alias("dV2", "jvolume", FieldCategory::Geometry),
    alias("dV3", "kvolume", FieldCategory::Geometry),
    alias("v1", " i velocity", FieldCategory::Kinematic),
    alias("v2", " j velocity", FieldCategory::Kinematic),
    alias("v3", " k velocity", FieldCategory::Kinematic),
    alias("B1", "i mag field", FieldCategory::Magnetic),
    alias("B2", "j mag field", FieldCategory::Magnetic),
    alias("B3", "k mag field", FieldCategory::Magnetic),
    alias("e", " gas energy", FieldCategory::PhysicalState),
    alias("d", "gas density", FieldCategory::PhysicalState),
    alias("T", "temperature", FieldCategory::PhysicalState),
    alias("cs2", "soundspeed2", FieldCategory::PhysicalState),
    alias("gp", "g potential", FieldCategory::PhysicalState),
    alias("A", "aspec", FieldCategory::Composition),
    alias("Z", "zspec", FieldCategory::Composition),
    alias("X", "abun", FieldCategory::Composition),
];

pub fn field_alias(name: &str) -> Option<&'static FieldAlias> {
    FIELD_ALIASES.iter().find(|alias| alias.name == name)
}

/// A named grid quantity with singleton axes squeezed away.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    values: ArrayD<f64>,
}

impl Field {
    pub fn new(name: impl Into<String>, values: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            values: squeeze(values),
        }
    }

    pub fn from_shape_vec(
        name: impl Into<String>,
        shape: &[usize],
        data: Vec<f64>,
    ) -> Result<Self, ShapeError> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(Self::new(name, values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.iter().next().copied()
    }
}

fn squeeze(mut values: ArrayD<f64>) -> ArrayD<f64> {
    for axis in (0..values.ndim()).rev() {
        if values.len_of(Axis(axis)) == 1 {
            values = values.index_axis_move(Axis(axis), 0);
        }
    }
    values
}

/// All fields read from one dump at one simulation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    fields: Vec<Field>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut dataset = Self::new();
        for field in fields {
            dataset.insert(field);
        }
        dataset
    }

    pub fn with_field(mut self, name: impl Into<String>, values: ArrayD<f64>) -> Self {
        self.insert(Field::new(name, values));
        self
    }

    /// Replaces any field already stored under the same name, keeping its position.
    pub fn insert(&mut self, field: Field) {
        match self
            .fields
            .iter_mut()
            .find(|existing| existing.name == field.name)
        {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn time(&self) -> Option<f64> {
        self.get("t").and_then(Field::first)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

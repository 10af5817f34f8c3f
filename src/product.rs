//! Products of schematic construction

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::id::Id;

/// Kind of product a task can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    SchematicDefinition,
    Source,
    TestSource,
    ExplodedModule,
    ExplodedTestModule,
    Module,
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProductType::SchematicDefinition => "SCHEMATIC_DEFINITION",
            ProductType::Source => "SOURCE",
            ProductType::TestSource => "TEST_SOURCE",
            ProductType::ExplodedModule => "EXPLODED_MODULE",
            ProductType::ExplodedTestModule => "EXPLODED_TEST_MODULE",
            ProductType::Module => "MODULE",
        };
        write!(f, "{name}")
    }
}

/// Accumulated products of one schematic's task pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Products {
    entries: Vec<(PathBuf, ProductType)>,
}

impl Products {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product; adding the same path and type twice keeps one entry
    pub fn with(mut self, path: impl Into<PathBuf>, product_type: ProductType) -> Self {
        let entry = (path.into(), product_type);
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
        self
    }

    /// Remove every product of a type
    pub fn without(mut self, product_type: ProductType) -> Self {
        self.entries.retain(|(_, existing)| *existing != product_type);
        self
    }

    pub fn by_type(&self, product_type: ProductType) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|(_, existing)| *existing == product_type)
            .map(|(path, _)| path.as_path())
            .collect()
    }

    /// First product of a type
    pub fn single(&self, product_type: ProductType) -> Option<&Path> {
        self.by_type(product_type).into_iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, ProductType)> {
        self.entries.iter().map(|(path, product_type)| (path.as_path(), *product_type))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity of a constructed schematic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SchematicCoordinates {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl SchematicCoordinates {
    pub fn id(&self) -> Id {
        Id::new(&self.group, &self.name)
    }
}

impl fmt::Display for SchematicCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id(), self.version)
    }
}

/// A product together with the schematic that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub schematic: SchematicCoordinates,
    pub path: PathBuf,
    pub product_type: ProductType,
}

/// Everything a schematic leaves behind for its dependents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructedSchematic {
    pub coordinates: SchematicCoordinates,
    pub products: Products,
    /// Implementation dependencies handed on to dependents
    #[serde(skip)]
    pub exports: Vec<Artifact>,
}

/// Products of every schematic constructed so far, in construction order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchematicProducts {
    schematics: Vec<ConstructedSchematic>,
}

impl SchematicProducts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a constructed schematic, replacing an earlier record of the same name
    pub fn with(mut self, constructed: ConstructedSchematic) -> Self {
        self.schematics
            .retain(|existing| existing.coordinates.name != constructed.coordinates.name);
        self.schematics.push(constructed);
        self
    }

    pub fn schematic(&self, name: &str) -> Option<&ConstructedSchematic> {
        self.schematics
            .iter()
            .find(|constructed| constructed.coordinates.name == name)
    }

    pub fn products(&self, name: &str) -> Option<&Products> {
        self.schematic(name).map(|constructed| &constructed.products)
    }

    /// Products of a schematic of one type; empty when the schematic is unknown
    pub fn by_type(&self, name: &str, product_type: ProductType) -> Vec<&Path> {
        self.products(name)
            .map(|products| products.by_type(product_type))
            .unwrap_or_default()
    }

    pub fn schematics(&self) -> &[ConstructedSchematic] {
        &self.schematics
    }

    /// Every product of every schematic
    pub fn all(&self) -> Vec<Product> {
        self.schematics
            .iter()
            .flat_map(|constructed| {
                constructed.products.iter().map(|(path, product_type)| Product {
                    schematic: constructed.coordinates.clone(),
                    path: path.to_path_buf(),
                    product_type,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinates(name: &str) -> SchematicCoordinates {
        SchematicCoordinates {
            group: "g".into(),
            name: name.into(),
            version: "1.0.0".into(),
        }
    }

    #[test]
    fn test_products_keep_insertion_order_without_duplicates() {
        let products = Products::new()
            .with("a.module", ProductType::Module)
            .with("src", ProductType::Source)
            .with("a.module", ProductType::Module)
            .with("b.module", ProductType::Module);
        assert_eq!(products.len(), 3);
        assert_eq!(
            products.by_type(ProductType::Module),
            vec![Path::new("a.module"), Path::new("b.module")]
        );
        assert_eq!(products.single(ProductType::Source), Some(Path::new("src")));
        assert!(products.without(ProductType::Module).single(ProductType::Module).is_none());
    }

    #[test]
    fn test_schematic_products_lookup() {
        let products = SchematicProducts::new()
            .with(ConstructedSchematic {
                coordinates: coordinates("library"),
                products: Products::new().with("library.module", ProductType::Module),
                exports: Vec::new(),
            })
            .with(ConstructedSchematic {
                coordinates: coordinates("app"),
                products: Products::new(),
                exports: Vec::new(),
            });
        assert_eq!(
            products.by_type("library", ProductType::Module),
            vec![Path::new("library.module")]
        );
        assert!(products.by_type("unknown", ProductType::Module).is_empty());
        assert_eq!(products.all().len(), 1);
        assert_eq!(products.all()[0].schematic.to_string(), "g:library:1.0.0");
    }

    #[test]
    fn test_product_type_display_matches_serialized_form() {
        let serialized = serde_json::to_string(&ProductType::ExplodedTestModule).unwrap();
        assert_eq!(serialized, format!("\"{}\"", ProductType::ExplodedTestModule));
    }
}

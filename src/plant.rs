use crate::tree::ValueSchema;
use crate::utils;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{what} has shape {found} but {expected} was expected")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },
    #[error("the scenario tree carries no value named {0}")]
    MissingValue(String),
    #[error("unknown risk measure kind {0}")]
    UnknownRiskMeasure(String),
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

fn check_len(what: &str, found: usize, expected: usize) -> Result<(), ConfigError> {
    if found != expected {
        return Err(ConfigError::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// Fixed physical parameters of the refinery. Crude oil (light and heavy)
/// is distilled into `num_products` intermediates, which are routed to one
/// refining unit per output product.
#[derive(Debug, Clone)]
pub struct Plant {
    pub distillation_capacity: f64,
    pub num_products: usize,
    /// Intermediate yield per unit of crude, indexed by intermediate then
    /// `[light, heavy]`.
    pub crude_ratios: Vec<[f64; 2]>,
    /// Input capacity of each output's refining unit.
    pub refine_caps: Vec<f64>,
    /// Output yield per unit of intermediate, indexed by output then
    /// intermediate.
    pub product_ratios: Vec<Vec<f64>>,
    pub allowed_output_change: f64,
}

impl Plant {
    pub fn new(
        distillation_capacity: f64,
        num_products: usize,
        crude_ratios: Vec<Vec<f64>>,
        refine_caps: Vec<f64>,
        product_ratios: Vec<Vec<f64>>,
        allowed_output_change: f64,
    ) -> Result<Self, ConfigError> {
        check_len("crude_ratios", crude_ratios.len(), num_products)?;
        let mut crude = Vec::<[f64; 2]>::with_capacity(num_products);
        for (prod, ratios) in crude_ratios.iter().enumerate() {
            check_len(&format!("crude_ratios[{}]", prod), ratios.len(), 2)?;
            crude.push([ratios[0], ratios[1]]);
        }
        let plant = Self {
            distillation_capacity,
            num_products,
            crude_ratios: crude,
            refine_caps,
            product_ratios,
            allowed_output_change,
        };
        plant.validate()?;
        Ok(plant)
    }

    /// Checks every parameter array against the declared product count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let products = self.num_products;
        check_len("crude_ratios", self.crude_ratios.len(), products)?;
        check_len("refine_caps", self.refine_caps.len(), products)?;
        check_len("product_ratios", self.product_ratios.len(), products)?;
        for (output, ratios) in self.product_ratios.iter().enumerate() {
            check_len(&format!("product_ratios[{}]", output), ratios.len(), products)?;
        }
        if !(self.distillation_capacity >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "distillation_capacity",
                value: self.distillation_capacity,
            });
        }
        if !(self.allowed_output_change >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "allowed_output_change",
                value: self.allowed_output_change,
            });
        }
        Ok(())
    }

    /// Intermediate quantities produced by distilling the given imports.
    pub fn distill(&self, light: f64, heavy: f64) -> Vec<f64> {
        self.crude_ratios
            .iter()
            .map(|ratios| utils::dot_product(ratios, &[light, heavy]))
            .collect()
    }

    pub fn default() -> Self {
        Self {
            distillation_capacity: 500.0,
            num_products: 3,
            crude_ratios: vec![[2.0, 0.0], [1.0, 1.0], [0.0, 2.0]],
            refine_caps: vec![1000.0, 1000.0, 1000.0],
            product_ratios: vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            allowed_output_change: 1000.0,
        }
    }
}

pub const LIGHT_CRUDE_PRICE: &str = "crude_light_price";
pub const HEAVY_CRUDE_PRICE: &str = "crude_heavy_price";

pub fn product_price_name(output: usize) -> String {
    format!("prod_price_{}", output)
}

pub fn demand_name(output: usize) -> String {
    format!("demand_{}", output)
}

/// Positions of the market values inside each node's value record,
/// resolved once from the tree schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketIndices {
    pub light_crude_price: usize,
    pub heavy_crude_price: usize,
    pub product_prices: Vec<usize>,
    pub demands: Vec<usize>,
}

impl MarketIndices {
    pub fn resolve(schema: &ValueSchema, num_products: usize) -> Result<Self, ConfigError> {
        let find = |name: &str| {
            schema
                .index_of(name)
                .ok_or_else(|| ConfigError::MissingValue(name.to_string()))
        };
        let light_crude_price = find(LIGHT_CRUDE_PRICE)?;
        let heavy_crude_price = find(HEAVY_CRUDE_PRICE)?;
        let product_prices = (0..num_products)
            .map(|output| find(&product_price_name(output)))
            .collect::<Result<Vec<usize>, ConfigError>>()?;
        let demands = (0..num_products)
            .map(|output| find(&demand_name(output)))
            .collect::<Result<Vec<usize>, ConfigError>>()?;
        Ok(Self {
            light_crude_price,
            heavy_crude_price,
            product_prices,
            demands,
        })
    }

    /// The value names a tree needs to carry for a plant of this size.
    pub fn required_names(num_products: usize) -> Vec<String> {
        let mut names = vec![
            LIGHT_CRUDE_PRICE.to_string(),
            HEAVY_CRUDE_PRICE.to_string(),
        ];
        names.extend((0..num_products).map(product_price_name));
        names.extend((0..num_products).map(demand_name));
        names
    }
}

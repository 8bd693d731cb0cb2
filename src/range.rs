use crate::error::{Result, SweepError};
use crate::{CandidateValue, ParamDescriptor, ParamType};

/// Lower end of a numeric sweep, as a multiple of the default value.
pub const LOWER_FACTOR: f64 = 0.1;
/// Upper end of a numeric sweep, as a multiple of the default value.
pub const UPPER_FACTOR: f64 = 10.0;
pub const RANGE_FACTOR: f64 = UPPER_FACTOR - LOWER_FACTOR;

/// Produces the ordered candidate values for one parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamRangeGenerator {
    experiment_count: u32,
}

impl ParamRangeGenerator {
    pub fn new(experiment_count: u32) -> Self {
        Self {
            experiment_count: experiment_count.max(1),
        }
    }

    pub fn experiment_count(&self) -> u32 {
        self.experiment_count
    }

    pub fn generate(&self, descriptor: &ParamDescriptor) -> Result<Vec<CandidateValue>> {
        match &descriptor.param_type {
            ParamType::Int => self.int_range(descriptor),
            ParamType::Double => self.real_range(descriptor),
            ParamType::Select => Ok(descriptor
                .options
                .as_ref()
                .map(|options| {
                    options
                        .iter()
                        .map(|option| CandidateValue::Select(option.key.clone()))
                        .collect()
                })
                .unwrap_or_default()),
            ParamType::Boolean => Ok(vec![CandidateValue::Bool(true), CandidateValue::Bool(false)]),
            ParamType::String | ParamType::Other(_) => Ok(Vec::new()),
        }
    }

    fn int_range(&self, descriptor: &ParamDescriptor) -> Result<Vec<CandidateValue>> {
        let default = descriptor
            .default_value
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid_default(descriptor))?;
        let default = default as f64;

        let start = (default * LOWER_FACTOR).floor() as i64;
        let end = (default * UPPER_FACTOR).floor() as i64;
        // Clamped so an experiment count wider than the range still advances.
        let step = ((default * RANGE_FACTOR).floor() as i64 / i64::from(self.experiment_count)).max(1);

        let mut values = Vec::new();
        let mut current = start;
        while current <= end {
            values.push(CandidateValue::Int(current));
            current = match current.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(values)
    }

    fn real_range(&self, descriptor: &ParamDescriptor) -> Result<Vec<CandidateValue>> {
        let default = descriptor
            .default_value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| invalid_default(descriptor))?;

        let lower = default * LOWER_FACTOR;
        let upper = default * UPPER_FACTOR;
        let step = default * RANGE_FACTOR / f64::from(self.experiment_count);

        if !(step > 0.0) || !step.is_finite() {
            if lower <= upper {
                return Ok(vec![CandidateValue::Real(lower)]);
            }
            return Ok(Vec::new());
        }

        let mut values = Vec::new();
        let mut index = 0u32;
        loop {
            let value = lower + step * f64::from(index);
            if value > upper {
                break;
            }
            values.push(CandidateValue::Real(value));
            index += 1;
        }
        Ok(values)
    }
}

fn invalid_default(descriptor: &ParamDescriptor) -> SweepError {
    SweepError::InvalidDefault {
        key: descriptor.key.clone(),
        value: descriptor.default_value.clone(),
    }
}

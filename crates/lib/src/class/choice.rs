//! Choice parameters.
//!
//! A choice parameter refers to one entity whose type is one of a fixed set,
//! such as an owner that may be a customer, a vendor or an employee. The
//! allowed types are recorded per (type, parameter) here.

use tracing::debug;

use super::{ClassError, ClassRegistry};

impl ClassRegistry {
    /// Creates an empty choice table for `e_type`. Creating it twice is a no-op.
    pub fn choice_create(&self, e_type: &str) -> Result<(), ClassError> {
        if e_type.is_empty() {
            return Err(ClassError::EmptyTypeName);
        }
        self.choices
            .borrow_mut()
            .entry(e_type.to_string())
            .or_default();
        Ok(())
    }

    pub fn is_choice(&self, e_type: &str) -> bool {
        self.choices.borrow().contains_key(e_type)
    }

    /// Allows `option` as a referent type of parameter `param` on `select`.
    pub fn choice_add_class(&self, select: &str, option: &str, param: &str) -> Result<(), ClassError> {
        let mut choices = self.choices.borrow_mut();
        let table = choices.get_mut(select).ok_or_else(|| ClassError::NotAChoice {
            e_type: select.to_string(),
        })?;
        let options = table.entry(param.to_string()).or_default();
        if !options.iter().any(|o| o == option) {
            options.push(option.to_string());
            debug!(select, option, param, "choice option added");
        }
        Ok(())
    }

    /// Allowed referent types of `param` on `e_type`, in insertion order.
    pub fn choice_options(&self, e_type: &str, param: &str) -> Vec<String> {
        self.choices
            .borrow()
            .get(e_type)
            .and_then(|table| table.get(param))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `candidate` is an allowed referent type of `param` on `e_type`.
    pub fn choice_check(&self, e_type: &str, param: &str, candidate: &str) -> bool {
        self.choices
            .borrow()
            .get(e_type)
            .and_then(|table| table.get(param))
            .is_some_and(|options| options.iter().any(|o| o == candidate))
    }
}

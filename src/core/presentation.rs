use crate::core::expression::Expression;

/// Mode flags shared by the engine and the user actions. Owned by the controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationState {
    /// Suppresses automatic evaluation and keeps the bubble hidden.
    pub sleeping: bool,
    /// A one-off message (fortune) is on screen until explicitly restored.
    pub temp_override_active: bool,
    /// Last thing rendered.
    pub current_expression: Option<Expression>,
}

impl PresentationState {
    pub fn accepts_evaluation(&self) -> bool {
        !self.sleeping && !self.temp_override_active
    }

    /// Flips sleep and returns the new value.
    pub fn toggle_sleep(&mut self) -> bool {
        self.sleeping = !self.sleeping;
        self.sleeping
    }

    pub fn begin_override(&mut self, expression: Expression) {
        self.temp_override_active = true;
        self.current_expression = Some(expression);
    }

    /// Clears the override. Returns whether one was active.
    pub fn end_override(&mut self) -> bool {
        std::mem::replace(&mut self.temp_override_active, false)
    }

    pub fn record(&mut self, expression: Expression) {
        self.current_expression = Some(expression);
    }
}

pub mod habit;
pub mod planning;
pub mod schedule;
pub mod todo;

pub use habit::{Habit, HabitLog, NewHabit};
pub use planning::{
  CalendarRule, DailyNote, Goal, Mantra, NewCalendarRule, UserPreferences, Vision,
  DEFAULT_BED_TIME, DEFAULT_WAKE_TIME,
};
pub use schedule::{NewScheduleEvent, ScheduleEvent};
pub use todo::{NewTodo, Todo};

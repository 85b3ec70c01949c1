pub mod date_remark;
pub mod employee;
pub mod leave_request;
pub mod org_unit;
pub mod schedule_template;
pub mod shift;

pub use date_remark::DateRemarkRepository;
pub use employee::EmployeeRepository;
pub use leave_request::LeaveRequestRepository;
pub use org_unit::OrgUnitRepository;
pub use schedule_template::ScheduleTemplateRepository;
pub use shift::ShiftRepository;

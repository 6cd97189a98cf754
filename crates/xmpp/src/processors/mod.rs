mod ignore_groups;

pub use ignore_groups::IgnoreGroupsProcessor;

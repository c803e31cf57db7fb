//! Executive event identifiers.
//!
//! Numeric ids fired through the `EventSink` collaborator for
//! operator-visible state changes and error conditions.

use kestrel_platform::EventId;

pub const EVT_SYSTEM_OPERATIONAL: EventId = EventId(1);
pub const EVT_STARTUP_SYNC_TIMEOUT: EventId = EventId(2);
pub const EVT_MANIFEST_LINE_ERROR: EventId = EventId(3);
pub const EVT_APP_STARTED: EventId = EventId(4);
pub const EVT_APP_START_ERROR: EventId = EventId(5);
pub const EVT_LIB_LOADED: EventId = EventId(6);
pub const EVT_LIB_LOAD_ERROR: EventId = EventId(7);
pub const EVT_APP_CLEANUP: EventId = EventId(8);
pub const EVT_APP_CLEANUP_ERROR: EventId = EventId(9);
pub const EVT_APP_RESTARTED: EventId = EventId(10);
pub const EVT_APP_RESTART_ERROR: EventId = EventId(11);
pub const EVT_APP_RELOADED: EventId = EventId(12);
pub const EVT_APP_RELOAD_ERROR: EventId = EventId(13);
pub const EVT_INVALID_CONTROL_REQUEST: EventId = EventId(14);
pub const EVT_EXCEPTION_APP_RESTART: EventId = EventId(15);
pub const EVT_SYSTEM_RESTART: EventId = EventId(16);
pub const EVT_COMMAND_LENGTH_ERROR: EventId = EventId(17);
pub const EVT_COMMAND_ERROR: EventId = EventId(18);
pub const EVT_NOOP: EventId = EventId(19);
pub const EVT_RESET_COUNTERS: EventId = EventId(20);
pub const EVT_SYSLOG_CLEARED: EventId = EventId(21);
pub const EVT_SYSLOG_WRITTEN: EventId = EventId(22);
pub const EVT_SYSLOG_MODE: EventId = EventId(23);
pub const EVT_ERLOG_CLEARED: EventId = EventId(24);
pub const EVT_ERLOG_PENDING: EventId = EventId(25);
pub const EVT_ERLOG_WRITTEN: EventId = EventId(26);
pub const EVT_ERLOG_WRITE_ERROR: EventId = EventId(27);
pub const EVT_DUMP_ALREADY_PENDING: EventId = EventId(28);
pub const EVT_PERF_STARTED: EventId = EventId(29);
pub const EVT_PERF_STOPPED: EventId = EventId(30);
pub const EVT_PERF_MASK_SET: EventId = EventId(31);
pub const EVT_PERF_MASK_ERROR: EventId = EventId(32);
pub const EVT_PERF_DUMP_COMPLETE: EventId = EventId(33);
pub const EVT_PERF_DUMP_ERROR: EventId = EventId(34);
pub const EVT_PR_COUNT_RESET: EventId = EventId(35);
pub const EVT_MAX_PR_COUNT_SET: EventId = EventId(36);
pub const EVT_CDS_DELETED: EventId = EventId(37);
pub const EVT_CDS_DELETE_ERROR: EventId = EventId(38);
pub const EVT_CDS_DUMPED: EventId = EventId(39);
pub const EVT_APP_INFO: EventId = EventId(40);
pub const EVT_QUERY_WRITTEN: EventId = EventId(41);
pub const EVT_QUERY_ERROR: EventId = EventId(42);
pub const EVT_POOL_STATS: EventId = EventId(43);
pub const EVT_POOL_STATS_ERROR: EventId = EventId(44);
pub const EVT_APP_STOP_QUEUED: EventId = EventId(45);

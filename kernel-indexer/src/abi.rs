use alloy_sol_macro::sol;

sol! {
    interface IKernel {
        event ActionExecuted(uint8 indexed action_, address indexed target_);

        function executor() external view returns (address executor_);
    }

    interface IModule {
        function KEYCODE() external pure returns (bytes5 keycode_);
    }

    interface IPolicy {
        struct Permissions {
            bytes5 keycode;
            bytes4 funcSelector;
        }

        function requestPermissions() external view returns (Permissions[] memory requests);
    }

    interface IRoles {
        event RoleGranted(bytes32 indexed role_, address indexed addr_);
        event RoleRevoked(bytes32 indexed role_, address indexed addr_);
    }

    interface IRolesAdmin {
        event NewAdminPulled(address indexed newAdmin_);

        function admin() external view returns (address admin_);
    }
}
